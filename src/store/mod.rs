//! The Zarr v2 view of a slide.
//!
//! - [`metadata`]: `.zgroup`, `.zattrs`, and per-level `.zarray` documents
//! - [`chunk_key`]: `<level>/<row>.<col>.<group>` parsing
//! - [`SlideStore`]: metadata lookups plus lazy chunk reads

pub mod chunk_key;
pub mod metadata;
mod slide_store;

pub use chunk_key::{parse_chunk_key, ChunkCoord};
pub use metadata::{create_meta_store, MetaStore};
pub use slide_store::{Keys, SlideStore};
