use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SlideError;
use crate::format::SlideProperties;
use crate::io::FileRangeReader;

use super::backend::{LevelProperties, PixelBuffer, SlideBackend, SlideIdentity};
use super::tiled::{OutputLayout, TiledSlide};

/// Slide backend that exposes its pyramid as direct attributes and renders
/// RGBA regions.
///
/// Identified by filename. Closing releases the file; reads after that fail
/// with a closed-resource error.
pub struct DirectSlide {
    path: PathBuf,
    slide: TiledSlide<FileRangeReader>,
    level_dimensions: Vec<(u32, u32)>,
    level_downsamples: Vec<f64>,
}

impl DirectSlide {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SlideError> {
        let path = path.as_ref().to_path_buf();
        let reader = Arc::new(FileRangeReader::open(&path).await?);
        let slide = TiledSlide::open(reader, None).await?;

        Ok(Self {
            level_dimensions: slide.level_dimensions(),
            level_downsamples: slide.level_downsamples(),
            path,
            slide,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.slide.reader().is_closed()
    }
}

#[async_trait]
impl SlideBackend for DirectSlide {
    fn levels(&self) -> LevelProperties<'_> {
        LevelProperties::Direct {
            level_count: self.level_dimensions.len(),
            level_dimensions: &self.level_dimensions,
            level_downsamples: &self.level_downsamples,
        }
    }

    fn channels(&self) -> usize {
        OutputLayout::Rgba.channels()
    }

    fn identity(&self) -> Option<SlideIdentity<'_>> {
        Some(SlideIdentity::Filename(&self.path))
    }

    async fn read_region(
        &self,
        origin: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<PixelBuffer, SlideError> {
        if self.is_closed() {
            return Err(SlideError::Closed(self.path.display().to_string()));
        }
        self.slide
            .read_region(origin, level, size, OutputLayout::Rgba)
            .await
    }

    fn close(&self) {
        if !self.is_closed() {
            self.slide.reader().close();
            debug!(slide = %self.path.display(), "closed slide");
        }
    }

    fn properties(&self) -> Option<&SlideProperties> {
        Some(self.slide.properties())
    }
}
