use std::path::Path;

use clap::ValueEnum;

use crate::config::StoreOptions;
use crate::error::SlideError;

use super::backend::SlideBackend;
use super::direct::DirectSlide;
use super::resolutions::ResolutionsSlide;

/// Which slide backend a store opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum BackendKind {
    /// RGBA regions, level attributes exposed directly, closable
    #[default]
    Direct,

    /// RGB regions, nested level attributes, decoded tile cache
    Resolutions,
}

impl BackendKind {
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Direct => "direct",
            BackendKind::Resolutions => "resolutions",
        }
    }
}

/// Open a slide with the selected backend.
pub async fn open_slide(
    kind: BackendKind,
    path: impl AsRef<Path>,
    options: &StoreOptions,
) -> Result<Box<dyn SlideBackend>, SlideError> {
    let backend: Box<dyn SlideBackend> = match kind {
        BackendKind::Direct => Box::new(DirectSlide::open(path).await?),
        BackendKind::Resolutions => Box::new(
            ResolutionsSlide::open(path, options.cache_capacity_mb, options.record_cache_stats)
                .await?,
        ),
    };
    Ok(backend)
}
