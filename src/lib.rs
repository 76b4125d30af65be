//! # wsi-zarr
//!
//! Presents a Whole Slide Image as a read-only, multiscale Zarr v2 store.
//!
//! Opening a store builds the group, attribute, and per-level array metadata
//! up front. Chunk keys (`<level>/<row>.<col>.<group>`) are turned into region
//! reads against the slide on demand, so nothing but the requested tiles is
//! ever decoded.
//!
//! ## Modules
//!
//! - [`io`] - range readers over local files and memory
//! - [`mod@format`] - TIFF/BigTIFF parsing, format detection, tile decoding
//! - [`slide`] - slide backends and region composition
//! - [`store`] - Zarr metadata, chunk keys, and [`SlideStore`]
//! - [`config`] - store options and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_zarr::{SlideStore, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SlideStore::open("CMU-1.svs", StoreOptions::default()).await?;
//!
//!     for key in &store {
//!         println!("{key}");
//!     }
//!     let chunk = store.get("0/0.0.0").await?;
//!     assert_eq!(chunk.len(), 512 * 512 * 4);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod slide;
pub mod store;

pub use config::{StoreOptions, DEFAULT_CACHE_CAPACITY_MB, DEFAULT_TILE_SIZE};
pub use error::{ChunkKeyError, IoError, LookupError, SlideError, StoreError, TiffError};
pub use format::{detect_format, SlideFormat, SlideProperties};
pub use io::{BytesRangeReader, FileRangeReader, RangeReader};
pub use slide::{
    open_slide, BackendKind, CacheStats, DirectSlide, LevelProperties, PixelBuffer, Resolutions,
    ResolutionsSlide, SlideBackend, SlideIdentity,
};
pub use store::{create_meta_store, parse_chunk_key, ChunkCoord, MetaStore, SlideStore};
