use thiserror::Error;

/// I/O errors that can occur when reading slide bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the operating system
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// The resource was closed before the read was issued
    #[error("Resource is closed: {0}")]
    Closed(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors reported by a slide backend.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// I/O error while reading the slide
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF structure error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// The file is not a slide this backend can read
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// Requested pyramid level does not exist
    #[error("Level {level} out of range (slide has {count} levels)")]
    LevelOutOfRange { level: usize, count: usize },

    /// Requested region lies entirely outside the level
    #[error("Region at ({x}, {y}) of size {width}x{height} is outside level {level}")]
    RegionOutOfBounds {
        level: usize,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    /// Tile data could not be decoded
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// The slide handle was closed
    #[error("Slide is closed: {0}")]
    Closed(String),
}

impl SlideError {
    /// Whether this error means the underlying resource has been released.
    ///
    /// Closed resources are reported distinctly from every other failure, so
    /// the check looks through I/O and TIFF wrappers as well.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            SlideError::Closed(_)
                | SlideError::Io(IoError::Closed(_))
                | SlideError::Tiff(TiffError::Io(IoError::Closed(_)))
        )
    }
}

/// Errors from parsing a `<level>/<row>.<col>.<group>` chunk key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkKeyError {
    /// The key does not contain exactly one `/`
    #[error("Chunk key {key:?} must have the form <level>/<chunk>")]
    MissingSeparator { key: String },

    /// The chunk segment does not have three `.`-separated fields
    #[error("Chunk key {key:?} has {count} coordinate fields, expected 3")]
    FieldCount { key: String, count: usize },

    /// A field is not a non-negative decimal integer
    #[error("Chunk key {key:?} has non-integer field {field:?}")]
    InvalidInteger { key: String, field: String },
}

/// Errors returned by a store lookup.
///
/// A closed resource is the only failure reported as itself. Malformed keys,
/// unknown levels, out-of-bounds regions and decode failures all collapse into
/// `ChunkUnavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The slide was closed before the lookup
    #[error("Slide is closed; cannot read {key:?}")]
    ResourceClosed { key: String },

    /// The key is not a metadata key and no chunk could be produced for it
    #[error("Key not found: {key:?}")]
    ChunkUnavailable { key: String },
}

impl LookupError {
    /// The key the lookup was made for.
    pub fn key(&self) -> &str {
        match self {
            LookupError::ResourceClosed { key } | LookupError::ChunkUnavailable { key } => key,
        }
    }
}

/// Errors that can occur when constructing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to open the slide
    #[error("Failed to open slide: {0}")]
    Open(#[from] SlideError),

    /// Metadata could not be serialized
    #[error("Failed to serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Tile size must be positive
    #[error("Invalid tile size: {0}")]
    InvalidTileSize(u32),
}
