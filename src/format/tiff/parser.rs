//! TIFF header and IFD parsing.
//!
//! ## Classic TIFF
//! ```text
//! Header (8 bytes):   II|MM, 42, u32 first IFD offset
//! IFD:                u16 entry count, 12-byte entries, u32 next IFD offset
//! Entry:              u16 tag, u16 type, u32 count, 4-byte value/offset
//! ```
//!
//! ## BigTIFF
//! ```text
//! Header (16 bytes):  II|MM, 43, u16 offset size (8), u16 reserved, u64 first IFD offset
//! IFD:                u64 entry count, 20-byte entries, u64 next IFD offset
//! Entry:              u16 tag, u16 type, u64 count, 8-byte value/offset
//! ```

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

use super::tags::{FieldType, TiffTag};

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II"
    LittleEndian,
    /// "MM"
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// Whether offsets and counts are 64-bit
    pub is_bigtiff: bool,

    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from the first bytes of a file.
    ///
    /// `bytes` needs 8 bytes for classic TIFF and 16 for BigTIFF. The first IFD
    /// offset must lie inside `file_size`.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let byte_order = match &bytes[0..2] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(read_u16_le(bytes))),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            other => return Err(TiffError::InvalidVersion(other)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Size of one IFD entry: 12 bytes (TIFF) or 20 bytes (BigTIFF).
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the value/offset field, which is also the inline threshold.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IFD Entries
// =============================================================================

/// A single IFD entry.
///
/// Values that fit in the value/offset field are stored inline; everything
/// else is an offset into the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,

    /// Parsed field type, `None` if the type is not one we understand
    pub field_type: Option<FieldType>,

    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw value/offset field (4 or 8 bytes, file byte order)
    pub value_offset_bytes: Vec<u8>,

    pub is_inline: bool,
}

impl IfdEntry {
    /// Total size of the value in bytes, if the field type is known.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| ft.size_in_bytes() as u64 * self.count)
    }

    /// The value/offset field interpreted as a file offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Read a single unsigned integer stored inline.
    ///
    /// Returns `None` for arrays, non-integer types, or out-of-line values.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        let bytes = &self.value_offset_bytes;
        match self.field_type? {
            FieldType::Byte => Some(bytes[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(bytes) as u64),
            FieldType::Long => Some(byte_order.read_u32(bytes) as u64),
            FieldType::Long8 if bytes.len() >= 8 => Some(byte_order.read_u64(bytes)),
            _ => None,
        }
    }

    /// Read a single inline unsigned integer that fits in 32 bits.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u64(byte_order)
            .and_then(|v| u32::try_from(v).ok())
    }
}

// =============================================================================
// IFD
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ifd {
    /// Entries in file order (TIFF requires ascending tag order)
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD, 0 if this is the last one
    pub next_ifd_offset: u64,
}

impl Ifd {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total byte size of an IFD with `entry_count` entries, including the
    /// leading count and the trailing next-IFD offset.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.ifd_count_size()
            + entry_count as usize * header.ifd_entry_size()
            + header.value_offset_size()
    }

    /// Parse an IFD from bytes beginning at the IFD's offset.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let byte_order = header.byte_order;
        let count_size = header.ifd_count_size();
        let too_small = |required: usize| TiffError::FileTooSmall {
            required: required as u64,
            actual: bytes.len() as u64,
        };

        if bytes.len() < count_size {
            return Err(too_small(count_size));
        }
        let entry_count = if header.is_bigtiff {
            byte_order.read_u64(bytes)
        } else {
            byte_order.read_u16(bytes) as u64
        };

        let required = Self::calculate_size(entry_count, header);
        if bytes.len() < required {
            return Err(too_small(required));
        }

        let entry_size = header.ifd_entry_size();
        let value_size = header.value_offset_size();
        let mut entries = Vec::with_capacity(entry_count as usize);

        for i in 0..entry_count as usize {
            let raw = &bytes[count_size + i * entry_size..count_size + (i + 1) * entry_size];
            let tag_id = byte_order.read_u16(&raw[0..2]);
            let field_type_raw = byte_order.read_u16(&raw[2..4]);
            let field_type = FieldType::from_u16(field_type_raw);

            let (count, value_start) = if header.is_bigtiff {
                (byte_order.read_u64(&raw[4..12]), 12)
            } else {
                (byte_order.read_u32(&raw[4..8]) as u64, 8)
            };
            let value_offset_bytes = raw[value_start..value_start + value_size].to_vec();

            let is_inline = field_type
                .map(|ft| ft.size_in_bytes() as u64 * count <= value_size as u64)
                .unwrap_or(false);

            entries.push(IfdEntry {
                tag_id,
                field_type,
                field_type_raw,
                count,
                value_offset_bytes,
                is_inline,
            });
        }

        let next_start = count_size + entry_count as usize * entry_size;
        let next_ifd_offset = if header.is_bigtiff {
            byte_order.read_u64(&bytes[next_start..])
        } else {
            byte_order.read_u32(&bytes[next_start..]) as u64
        };

        Ok(Ifd {
            entries,
            next_ifd_offset,
        })
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag_id == tag.as_u16())
    }

    /// Read an inline scalar tag as u32.
    pub fn get_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageWidth, byte_order)
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageLength, byte_order)
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileWidth, byte_order)
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileLength, byte_order)
    }

    pub fn compression(&self, byte_order: ByteOrder) -> Option<u16> {
        self.get_u32(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
    }

    pub fn samples_per_pixel(&self, byte_order: ByteOrder) -> Option<u16> {
        self.get_u32(TiffTag::SamplesPerPixel, byte_order)
            .map(|v| v as u16)
    }

    /// Whether the image is stored as tiles rather than strips.
    pub fn is_tiled(&self) -> bool {
        self.get_entry_by_tag(TiffTag::TileWidth).is_some()
            && self.get_entry_by_tag(TiffTag::TileLength).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
