use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SlideError;
use crate::format::SlideProperties;
use crate::io::FileRangeReader;

use super::backend::{LevelProperties, PixelBuffer, Resolutions, SlideBackend, SlideIdentity};
use super::cache::{CacheStats, TileCache};
use super::tiled::{OutputLayout, TiledSlide};

/// Slide backend that nests its level attributes in a [`Resolutions`] record
/// and renders RGB regions.
///
/// Decoded tiles are kept in a size-bounded cache. Identified by path; there
/// is no close operation, the file is released when the backend is dropped.
pub struct ResolutionsSlide {
    path: PathBuf,
    slide: TiledSlide<FileRangeReader>,
    resolutions: Resolutions,
}

impl ResolutionsSlide {
    /// Open a slide with a tile cache of `cache_capacity_mb` megabytes.
    pub async fn open(
        path: impl AsRef<Path>,
        cache_capacity_mb: usize,
        record_cache_stats: bool,
    ) -> Result<Self, SlideError> {
        let path = path.as_ref().to_path_buf();
        let reader = Arc::new(FileRangeReader::open(&path).await?);
        let cache = TileCache::with_capacity_mb(cache_capacity_mb, record_cache_stats);
        let slide = TiledSlide::open(reader, Some(cache)).await?;

        let resolutions = Resolutions {
            level_count: slide.level_count(),
            level_dimensions: slide.level_dimensions(),
            level_downsamples: slide.level_downsamples(),
            level_tile_sizes: slide.level_tile_sizes(),
        };

        Ok(Self {
            path,
            slide,
            resolutions,
        })
    }

    pub fn resolutions(&self) -> &Resolutions {
        &self.resolutions
    }

    /// Tile cache hit and miss counts, if statistics are enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.slide.cache().and_then(TileCache::stats)
    }
}

#[async_trait]
impl SlideBackend for ResolutionsSlide {
    fn levels(&self) -> LevelProperties<'_> {
        LevelProperties::Nested(&self.resolutions)
    }

    fn channels(&self) -> usize {
        OutputLayout::Rgb.channels()
    }

    fn identity(&self) -> Option<SlideIdentity<'_>> {
        Some(SlideIdentity::Path(&self.path))
    }

    async fn read_region(
        &self,
        origin: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<PixelBuffer, SlideError> {
        self.slide
            .read_region(origin, level, size, OutputLayout::Rgb)
            .await
    }

    fn properties(&self) -> Option<&SlideProperties> {
        Some(self.slide.properties())
    }
}
