//! TIFF tag value reading.
//!
//! Values live either inline in the IFD entry or at an offset in the file.
//! Arrays (TileOffsets, TileByteCounts) are fetched with a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads tag values from a TIFF file respecting its byte order.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Raw bytes of an entry's value, inline or fetched from the file.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size as usize).await?)
    }

    /// Read an array of unsigned integers, widening to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        parse_u64_array(&bytes, entry.count as usize, field_type, self.header.byte_order)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "array",
                message: format!("expected Short, Long, or Long8, got {:?}", field_type),
            })
    }

    /// Read an ASCII value, dropping the NUL terminator.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        if entry.field_type != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag: "string",
                message: format!("expected Ascii, got type {}", entry.field_type_raw),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Decode `count` integers of `field_type` from `bytes`.
///
/// Returns `None` if the type is not an unsigned integer type. Values past the
/// end of `bytes` are dropped.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Option<Vec<u64>> {
    let width = match field_type {
        FieldType::Short | FieldType::Long | FieldType::Long8 => field_type.size_in_bytes(),
        _ => return None,
    };

    Some(
        bytes
            .chunks_exact(width)
            .take(count)
            .map(|chunk| match field_type {
                FieldType::Short => byte_order.read_u16(chunk) as u64,
                FieldType::Long => byte_order.read_u32(chunk) as u64,
                _ => byte_order.read_u64(chunk),
            })
            .collect(),
    )
}
