//! TIFF tag and field type definitions.
//!
//! Only the vocabulary needed to locate pyramid tiles and decode them is
//! defined here; unknown tags and field types are kept as raw numbers.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,

    /// 8-bit ASCII character
    Ascii = 2,

    /// Unsigned 16-bit integer
    Short = 3,

    /// Unsigned 32-bit integer
    Long = 4,

    /// Two Longs: numerator and denominator
    Rational = 5,

    /// Opaque byte data
    Undefined = 7,

    /// Unsigned 64-bit integer (BigTIFF only)
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs used when reading slide pyramids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    /// Carries the vendor metadata string in SVS files
    ImageDescription = 270,
    SamplesPerPixel = 277,
    PlanarConfiguration = 284,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,
    /// Quantization and Huffman tables shared by abbreviated JPEG tiles
    JpegTables = 347,
}

impl TiffTag {
    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::JpegTables => "JPEGTables",
        }
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// Tile compression schemes the slide readers can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Raw, uncompressed samples
    None,

    /// JPEG (possibly abbreviated, with shared JPEGTables)
    Jpeg,
}

impl Compression {
    /// Map a Compression tag value to a supported scheme.
    ///
    /// Returns `None` for schemes that cannot be decoded (LZW, Deflate,
    /// old-style JPEG, JPEG 2000, ...).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            7 => Some(Compression::Jpeg),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Jpeg => "JPEG",
        }
    }
}
