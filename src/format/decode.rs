//! Tile decoding to interleaved RGB.

use image::ImageFormat;

use crate::error::SlideError;

use super::jpeg::prepare_tile_jpeg;
use super::tiff::Compression;

/// A decoded tile: `width * height` interleaved RGB pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTile {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedTile {
    /// RGB triple at `(x, y)` within the tile.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    /// Heap size, used for cache accounting.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Layout of one level's tiles.
#[derive(Debug, Clone, Copy)]
pub struct TileLayout {
    pub compression: Compression,
    pub tile_width: u32,
    pub tile_height: u32,
    pub samples_per_pixel: u16,
}

/// Decode one tile's stored bytes.
///
/// JPEG tiles are merged with the level's shared tables first. Uncompressed
/// tiles must hold 8-bit chunky samples (1, 3, or 4 per pixel); gray is
/// replicated and a fourth sample is dropped.
pub fn decode_tile(
    layout: TileLayout,
    data: &[u8],
    jpeg_tables: Option<&[u8]>,
) -> Result<DecodedTile, SlideError> {
    match layout.compression {
        Compression::Jpeg => decode_jpeg(data, jpeg_tables),
        Compression::None => decode_raw(layout, data),
    }
}

fn decode_jpeg(data: &[u8], jpeg_tables: Option<&[u8]>) -> Result<DecodedTile, SlideError> {
    let jpeg = prepare_tile_jpeg(jpeg_tables, data);
    let img = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).map_err(|e| {
        SlideError::Decode {
            message: e.to_string(),
        }
    })?;

    let rgb = img.to_rgb8();
    Ok(DecodedTile {
        width: rgb.width(),
        height: rgb.height(),
        pixels: rgb.into_raw(),
    })
}

fn decode_raw(layout: TileLayout, data: &[u8]) -> Result<DecodedTile, SlideError> {
    let spp = layout.samples_per_pixel as usize;
    if !matches!(spp, 1 | 3 | 4) {
        return Err(SlideError::Decode {
            message: format!("unsupported samples per pixel: {}", spp),
        });
    }

    let pixel_count = layout.tile_width as usize * layout.tile_height as usize;
    let expected = pixel_count * spp;
    if data.len() < expected {
        return Err(SlideError::Decode {
            message: format!(
                "uncompressed tile has {} bytes, expected {}",
                data.len(),
                expected
            ),
        });
    }

    let pixels = match spp {
        3 => data[..expected].to_vec(),
        1 => data[..expected].iter().flat_map(|&g| [g, g, g]).collect(),
        _ => data[..expected]
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
    };

    Ok(DecodedTile {
        width: layout.tile_width,
        height: layout.tile_height,
        pixels,
    })
}
