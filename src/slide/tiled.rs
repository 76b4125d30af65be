//! Region reads over a tiled TIFF pyramid.
//!
//! Both backends share this: they differ only in how pixels outside the level
//! are filled, how many channels they emit, and whether decoded tiles are
//! cached.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::SlideError;
use crate::format::tiff::{Compression, PyramidLevel, TiffPyramid, TileData};
use crate::format::{decode_tile, detect_format, DecodedTile, SlideProperties, TileLayout};
use crate::io::RangeReader;

use super::backend::PixelBuffer;
use super::cache::{TileCache, TileCacheKey};

/// Pixel layout of region buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// Outside pixels are `(0, 0, 0, 0)`; inside pixels are opaque
    Rgba,

    /// Outside pixels are white
    Rgb,
}

impl OutputLayout {
    pub const fn channels(self) -> usize {
        match self {
            OutputLayout::Rgba => 4,
            OutputLayout::Rgb => 3,
        }
    }

    const fn fill(self) -> u8 {
        match self {
            OutputLayout::Rgba => 0,
            OutputLayout::Rgb => 255,
        }
    }
}

/// One level's tile locations and decode parameters.
#[derive(Debug)]
struct LevelTiles {
    level: PyramidLevel,
    data: TileData,
    layout: TileLayout,
}

/// A parsed pyramid plus the reader its tiles come from.
pub struct TiledSlide<R> {
    reader: Arc<R>,
    levels: Vec<LevelTiles>,
    properties: SlideProperties,
    cache: Option<TileCache>,
}

impl<R: RangeReader + 'static> TiledSlide<R> {
    /// Parse the pyramid and load every level's tile tables.
    ///
    /// Fails with `UnsupportedFormat` when the file has no tiled levels or a
    /// level uses a compression scheme that cannot be decoded.
    pub async fn open(reader: Arc<R>, cache: Option<TileCache>) -> Result<Self, SlideError> {
        let pyramid = TiffPyramid::parse(reader.as_ref()).await?;

        if pyramid.levels.is_empty() {
            return Err(SlideError::UnsupportedFormat {
                reason: format!("{} has no tiled pyramid levels", reader.identifier()),
            });
        }

        let format = detect_format(pyramid.description.as_deref());
        let properties = SlideProperties::parse(format, pyramid.description.as_deref());

        let mut levels = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            let compression = Compression::from_u16(level.compression).ok_or_else(|| {
                SlideError::UnsupportedFormat {
                    reason: format!(
                        "level {} uses unsupported compression {}",
                        level.level_index, level.compression
                    ),
                }
            })?;

            let data = TileData::load(reader.as_ref(), level, &pyramid.header).await?;
            levels.push(LevelTiles {
                layout: TileLayout {
                    compression,
                    tile_width: level.tile_width,
                    tile_height: level.tile_height,
                    samples_per_pixel: level.samples_per_pixel,
                },
                level: level.clone(),
                data,
            });
        }

        debug!(
            slide = reader.identifier(),
            format = format.name(),
            levels = levels.len(),
            ifds = pyramid.ifd_count,
            "opened tiled slide"
        );

        Ok(Self {
            reader,
            levels,
            properties,
            cache,
        })
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn properties(&self) -> &SlideProperties {
        &self.properties
    }

    pub fn cache(&self) -> Option<&TileCache> {
        self.cache.as_ref()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level_dimensions(&self) -> Vec<(u32, u32)> {
        self.levels
            .iter()
            .map(|l| (l.level.width, l.level.height))
            .collect()
    }

    pub fn level_downsamples(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.level.downsample).collect()
    }

    pub fn level_tile_sizes(&self) -> Vec<(u32, u32)> {
        self.levels
            .iter()
            .map(|l| (l.level.tile_width, l.level.tile_height))
            .collect()
    }

    fn level(&self, level: usize) -> Result<&LevelTiles, SlideError> {
        self.levels.get(level).ok_or(SlideError::LevelOutOfRange {
            level,
            count: self.levels.len(),
        })
    }

    /// Read and decode one tile, going through the cache when there is one.
    pub async fn read_tile(
        &self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Arc<DecodedTile>, SlideError> {
        let key = TileCacheKey::new(level, tile_x, tile_y);
        if let Some(cache) = &self.cache {
            if let Some(tile) = cache.get(&key).await {
                return Ok(tile);
            }
        }

        let lt = self.level(level)?;
        let (offset, length) = lt
            .level
            .tile_index(tile_x, tile_y)
            .and_then(|idx| lt.data.get_tile_location(idx))
            .ok_or_else(|| SlideError::Decode {
                message: format!("tile ({}, {}) missing at level {}", tile_x, tile_y, level),
            })?;

        let raw = self.reader.read_exact_at(offset, length as usize).await?;
        let tile = Arc::new(decode_blocking(lt.layout, raw, lt.data.jpeg_tables.clone()).await?);

        if let Some(cache) = &self.cache {
            cache.put(key, Arc::clone(&tile)).await;
        }
        Ok(tile)
    }

    /// Compose a region from the tiles it overlaps.
    ///
    /// `origin` is in level-0 pixels and is mapped to the level pixel whose
    /// level-0 span contains it (see [`level_coordinate`]). Pixels past the
    /// level's edge keep the layout's fill value.
    pub async fn read_region(
        &self,
        origin: (u64, u64),
        level: usize,
        size: (u32, u32),
        layout: OutputLayout,
    ) -> Result<PixelBuffer, SlideError> {
        let lt = self.level(level)?;
        let info = &lt.level;

        let lx = level_coordinate(origin.0, info.downsample);
        let ly = level_coordinate(origin.1, info.downsample);
        let (width, height) = size;

        if lx >= info.width as u64 || ly >= info.height as u64 {
            return Err(SlideError::RegionOutOfBounds {
                level,
                x: lx as i64,
                y: ly as i64,
                width,
                height,
            });
        }

        let channels = layout.channels();
        let mut out = PixelBuffer::filled(width, height, channels, layout.fill());
        if width == 0 || height == 0 {
            return Ok(out);
        }

        // Intersection with the level, in level coordinates.
        let (x0, y0) = (lx as u32, ly as u32);
        let x1 = (lx + width as u64).min(info.width as u64) as u32;
        let y1 = (ly + height as u64).min(info.height as u64) as u32;

        let out_stride = width as usize * channels;
        let samples = out.as_mut_slice();

        for ty in y0 / info.tile_height..=(y1 - 1) / info.tile_height {
            for tx in x0 / info.tile_width..=(x1 - 1) / info.tile_width {
                let tile = self.read_tile(level, tx, ty).await?;

                let tile_left = tx * info.tile_width;
                let tile_top = ty * info.tile_height;
                let cx0 = x0.max(tile_left);
                let cx1 = x1.min(tile_left + tile.width);
                let cy0 = y0.max(tile_top);
                let cy1 = y1.min(tile_top + tile.height);

                for y in cy0..cy1 {
                    let row = (y - y0) as usize * out_stride;
                    for x in cx0..cx1 {
                        let [r, g, b] = tile.pixel(x - tile_left, y - tile_top);
                        let i = row + (x - x0) as usize * channels;
                        samples[i..i + 3].copy_from_slice(&[r, g, b]);
                        if channels == 4 {
                            samples[i + 3] = 255;
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Map a level-0 coordinate to a level with downsample `downsample`.
///
/// Level pixel `p` spans level-0 coordinates `trunc(p * d)` up to
/// `trunc((p + 1) * d)`. The result is the pixel whose span contains
/// `origin`, so an origin computed as `trunc(p * d)` maps back to exactly `p`
/// even when `d` is fractional. For integer downsamples this is plain floor
/// division.
pub fn level_coordinate(origin: u64, downsample: f64) -> u64 {
    let d = downsample.max(1.0);
    let to_base = |p: u64| (p as f64 * d) as u64;

    let mut p = (origin as f64 / d).floor() as u64;
    while p > 0 && to_base(p) > origin {
        p -= 1;
    }
    while to_base(p + 1) <= origin {
        p += 1;
    }
    p
}

/// Decode on the blocking pool; JPEG decode is CPU bound.
async fn decode_blocking(
    layout: TileLayout,
    raw: Bytes,
    tables: Option<Bytes>,
) -> Result<DecodedTile, SlideError> {
    tokio::task::spawn_blocking(move || decode_tile(layout, &raw, tables.as_deref()))
        .await
        .map_err(|e| SlideError::Decode {
            message: e.to_string(),
        })?
}
