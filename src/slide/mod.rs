//! Slide backends.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               SlideStore                │
//! └────────────────────┬────────────────────┘
//!                      │ Box<dyn SlideBackend>
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   DirectSlide   │    │  ResolutionsSlide   │
//! │  RGBA, closable │    │  RGB, tile cache    │
//! └────────┬────────┘    └──────────┬──────────┘
//!          └───────────┬────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │     TiledSlide (TIFF pyramid reads)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The store only sees the [`SlideBackend`] trait; [`open_slide`] picks the
//! implementation from a [`BackendKind`].

mod backend;
mod cache;
mod direct;
mod factory;
mod resolutions;
mod tiled;

pub use backend::{LevelProperties, PixelBuffer, Resolutions, SlideBackend, SlideIdentity};
pub use cache::{CacheStats, TileCache, TileCacheKey};
pub use direct::DirectSlide;
pub use factory::{open_slide, BackendKind};
pub use resolutions::ResolutionsSlide;
pub use tiled::{level_coordinate, OutputLayout, TiledSlide};
