use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Random-access byte source for slide files.
///
/// The TIFF parser and the tile readers only ever ask for exact byte ranges,
/// so a slide never has to be loaded into memory as a whole.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Identifier used in log lines and error messages (usually the path).
    fn identifier(&self) -> &str;
}

/// Check that `[offset, offset + len)` lies within a resource of `size` bytes.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        }),
    }
}

/// A range reader over bytes already held in memory.
#[derive(Debug, Clone)]
pub struct BytesRangeReader {
    data: Bytes,
    identifier: String,
}

impl BytesRangeReader {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl RangeReader for BytesRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size())?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// TIFF files declare their byte order in the header; the parser dispatches to
// these. All of them panic if the slice is shorter than the value.

#[inline]
fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes(array(bytes))
}

#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes(array(bytes))
}

#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(array(bytes))
}

#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(array(bytes))
}

#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(array(bytes))
}

#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(array(bytes))
}
