//! TIFF pyramid level identification.
//!
//! A slide file holds several IFDs. Tiled IFDs that carry tile offsets and byte
//! counts are pyramid candidates; they are ordered by area and kept only while
//! each one is strictly smaller than the one before it. Stripped images
//! (labels, macros, thumbnails) never become levels.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

/// Maximum number of IFDs followed along the chain
const MAX_IFDS: usize = 100;

// =============================================================================
// PyramidLevel
// =============================================================================

/// A single level of the image pyramid. Level 0 is full resolution.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub level_index: usize,

    /// Position of the IFD in the file's chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,

    /// Downsample relative to level 0 (1.0 for level 0)
    pub downsample: f64,

    /// Raw Compression tag value, 1 if absent
    pub compression: u16,

    /// SamplesPerPixel, 1 if absent
    pub samples_per_pixel: u16,

    pub tile_offsets_entry: IfdEntry,
    pub tile_byte_counts_entry: IfdEntry,
    pub jpeg_tables_entry: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD.
    ///
    /// Returns `None` when the IFD lacks dimensions, tile geometry, or tile
    /// location arrays, or when its tile grid does not fit in `u32`.
    fn from_ifd(ifd: &Ifd, ifd_index: usize, byte_order: ByteOrder) -> Option<Self> {
        let tile_width = ifd.tile_width(byte_order).filter(|&w| w > 0)?;
        let tile_height = ifd.tile_height(byte_order).filter(|&h| h > 0)?;
        let width = ifd.image_width(byte_order).filter(|&w| w > 0)?;
        let height = ifd.image_height(byte_order).filter(|&h| h > 0)?;

        let tiles_x = width.div_ceil(tile_width);
        let tiles_y = height.div_ceil(tile_height);
        tiles_x.checked_mul(tiles_y)?;

        let tile_offsets_entry = ifd.get_entry_by_tag(TiffTag::TileOffsets)?.clone();
        let tile_byte_counts_entry = ifd.get_entry_by_tag(TiffTag::TileByteCounts)?.clone();

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            downsample: 1.0,
            compression: ifd.compression(byte_order).unwrap_or(1),
            samples_per_pixel: ifd.samples_per_pixel(byte_order).unwrap_or(1),
            tile_offsets_entry,
            tile_byte_counts_entry,
            jpeg_tables_entry: ifd.get_entry_by_tag(TiffTag::JpegTables).cloned(),
        })
    }

    /// Number of tiles in the grid. Never overflows: oversized grids are
    /// rejected when the level is built.
    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Row-major tile index, `None` outside the tile grid.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// All pyramid levels of a TIFF file, largest first.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,
    pub levels: Vec<PyramidLevel>,

    /// ImageDescription of the first IFD, where vendors put their metadata
    pub description: Option<String>,

    /// Number of IFDs read from the chain
    pub ifd_count: usize,
}

impl TiffPyramid {
    /// Read the header and IFD chain and identify the pyramid levels.
    pub async fn parse<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::parse_all_ifds(reader, &header).await?;

        let description = match ifds
            .first()
            .and_then(|ifd| ifd.get_entry_by_tag(TiffTag::ImageDescription))
        {
            Some(entry) => Some(ValueReader::new(reader, &header).read_string(entry).await?),
            None => None,
        };

        Ok(TiffPyramid {
            header,
            levels: Self::identify_levels(&ifds, header.byte_order),
            description,
            ifd_count: ifds.len(),
        })
    }

    async fn parse_all_ifds<R: RangeReader + ?Sized>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if offset >= reader.size() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
            let entry_count = if header.is_bigtiff {
                header.byte_order.read_u64(&count_bytes)
            } else {
                header.byte_order.read_u16(&count_bytes) as u64
            };

            let ifd_size = Ifd::calculate_size(entry_count, header);
            let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    /// Order tiled candidates by area and keep each one that shrinks in both
    /// dimensions (with at least one strictly smaller) relative to the last
    /// kept level.
    fn identify_levels(ifds: &[Ifd], byte_order: ByteOrder) -> Vec<PyramidLevel> {
        let mut candidates: Vec<PyramidLevel> = ifds
            .iter()
            .enumerate()
            .filter_map(|(i, ifd)| PyramidLevel::from_ifd(ifd, i, byte_order))
            .collect();

        candidates.sort_by(|a, b| {
            let area_a = a.width as u64 * a.height as u64;
            let area_b = b.width as u64 * b.height as u64;
            area_b.cmp(&area_a).then(a.ifd_index.cmp(&b.ifd_index))
        });

        let mut levels: Vec<PyramidLevel> = Vec::with_capacity(candidates.len());
        for mut level in candidates {
            if let Some(prev) = levels.last() {
                let shrinks = level.width <= prev.width
                    && level.height <= prev.height
                    && (level.width < prev.width || level.height < prev.height);
                if !shrinks {
                    continue;
                }
            }

            if let Some(base) = levels.first() {
                let dx = base.width as f64 / level.width as f64;
                let dy = base.height as f64 / level.height as f64;
                level.downsample = (dx + dy) / 2.0;
            }
            level.level_index = levels.len();
            levels.push(level);
        }

        levels
    }
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tile locations and shared JPEG tables for one level.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    /// Load the TileOffsets, TileByteCounts, and JPEGTables arrays of a level.
    pub async fn load<R: RangeReader + ?Sized>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets = values.read_u64_array(&level.tile_offsets_entry).await?;
        let byte_counts = values.read_u64_array(&level.tile_byte_counts_entry).await?;

        let expected = level.tile_count() as usize;
        if offsets.len() < expected || byte_counts.len() < expected {
            return Err(TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!(
                    "level {} needs {} tiles, found {} offsets and {} byte counts",
                    level.level_index,
                    expected,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match &level.jpeg_tables_entry {
            Some(entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and byte count of a tile.
    pub fn get_tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}

// =============================================================================
// Tests
// =============================================================================
