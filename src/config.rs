//! Configuration for the store and the `wsi-zarr` binary.
//!
//! [`StoreOptions`] is what the library consumes. The clap types below build it
//! from command-line flags, each of which can also be set through a `WSI_ZARR_`
//! environment variable:
//!
//! - `WSI_ZARR_TILE_SIZE` - chunk edge length in pixels (default: 512)
//! - `WSI_ZARR_BACKEND` - `direct` or `resolutions` (default: direct)
//! - `WSI_ZARR_CACHE_CAPACITY_MB` - decoded tile cache size (default: 2048)
//! - `WSI_ZARR_RECORD_CACHE_STATS` - count cache hits and misses (default: false)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::StoreError;
use crate::slide::BackendKind;

/// Default chunk edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Default decoded tile cache capacity of the resolutions backend, in MB.
pub const DEFAULT_CACHE_CAPACITY_MB: usize = 2048;

// =============================================================================
// Store Options
// =============================================================================

/// Options for opening a [`crate::SlideStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Edge length of every chunk
    pub tile_size: u32,

    pub backend: BackendKind,

    /// Tile cache capacity, used by the resolutions backend only
    pub cache_capacity_mb: usize,

    /// Count tile cache hits and misses
    pub record_cache_stats: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            backend: BackendKind::default(),
            cache_capacity_mb: DEFAULT_CACHE_CAPACITY_MB,
            record_cache_stats: false,
        }
    }
}

impl StoreOptions {
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.tile_size == 0 {
            return Err(StoreError::InvalidTileSize(self.tile_size));
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Browse a whole-slide image as a multiscale Zarr v2 store.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-zarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the store's metadata keys and documents
    Info(InfoArgs),

    /// Fetch one key and write its bytes out
    Get(GetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// Slide file to open
    pub path: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// Slide file to open
    pub path: PathBuf,

    /// Metadata key or chunk key such as `0/3.5.0`
    pub key: String,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Chunk edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "WSI_ZARR_TILE_SIZE")]
    pub tile_size: u32,

    /// Slide backend.
    #[arg(long, value_enum, default_value_t = BackendKind::Direct, env = "WSI_ZARR_BACKEND")]
    pub backend: BackendKind,

    /// Decoded tile cache capacity in megabytes (resolutions backend).
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY_MB, env = "WSI_ZARR_CACHE_CAPACITY_MB")]
    pub cache_capacity_mb: usize,

    /// Record tile cache hit and miss counts.
    #[arg(long, default_value_t = false, env = "WSI_ZARR_RECORD_CACHE_STATS")]
    pub record_cache_stats: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl StoreArgs {
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            tile_size: self.tile_size,
            backend: self.backend,
            cache_capacity_mb: self.cache_capacity_mb,
            record_cache_stats: self.record_cache_stats,
        }
    }
}

impl Command {
    pub fn store_args(&self) -> &StoreArgs {
        match self {
            Command::Info(args) => &args.store,
            Command::Get(args) => &args.store,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
