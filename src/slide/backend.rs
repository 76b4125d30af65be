use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SlideError;
use crate::format::SlideProperties;

// =============================================================================
// Level Properties
// =============================================================================

/// Level attributes of a backend that keeps them in a nested record.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolutions {
    pub level_count: usize,

    /// `(width, height)` per level
    pub level_dimensions: Vec<(u32, u32)>,

    /// Downsample per level relative to level 0
    pub level_downsamples: Vec<f64>,

    /// Native `(tile_width, tile_height)` per level
    pub level_tile_sizes: Vec<(u32, u32)>,
}

/// How a backend exposes its pyramid.
///
/// Some backends publish level count, dimensions, and downsamples as direct
/// attributes, others nest them in a [`Resolutions`] record. Consumers read
/// them through the accessors here and never look at the concrete backend.
#[derive(Debug, Clone, Copy)]
pub enum LevelProperties<'a> {
    Direct {
        level_count: usize,
        level_dimensions: &'a [(u32, u32)],
        level_downsamples: &'a [f64],
    },
    Nested(&'a Resolutions),
}

impl<'a> LevelProperties<'a> {
    pub fn level_count(&self) -> usize {
        match self {
            LevelProperties::Direct { level_count, .. } => *level_count,
            LevelProperties::Nested(res) => res.level_count,
        }
    }

    pub fn level_dimensions(&self) -> &'a [(u32, u32)] {
        match *self {
            LevelProperties::Direct {
                level_dimensions, ..
            } => level_dimensions,
            LevelProperties::Nested(res) => &res.level_dimensions,
        }
    }

    pub fn level_downsamples(&self) -> &'a [f64] {
        match *self {
            LevelProperties::Direct {
                level_downsamples, ..
            } => level_downsamples,
            LevelProperties::Nested(res) => &res.level_downsamples,
        }
    }

    /// `(width, height)` of a level, `None` past the last level.
    pub fn dimensions(&self, level: usize) -> Option<(u32, u32)> {
        if level >= self.level_count() {
            return None;
        }
        self.level_dimensions().get(level).copied()
    }

    /// Downsample of a level, `None` past the last level.
    pub fn downsample(&self, level: usize) -> Option<f64> {
        if level >= self.level_count() {
            return None;
        }
        self.level_downsamples().get(level).copied()
    }
}

// =============================================================================
// Identity
// =============================================================================

/// What a backend is identified by. Only identities of the same kind compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideIdentity<'a> {
    Filename(&'a Path),
    Path(&'a Path),
}

// =============================================================================
// Pixel Buffer
// =============================================================================

/// Row-major interleaved pixels, one byte per sample.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing samples.
    ///
    /// Returns `None` if `data` is not `width * height * channels` bytes long.
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * channels {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A buffer with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: usize, value: u8) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![value; width as usize * height as usize * channels],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Samples of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// =============================================================================
// SlideBackend Trait
// =============================================================================

/// A whole-slide image that can be read region by region.
///
/// Implementations handle their own synchronization; every method takes
/// `&self`, so a backend can serve concurrent reads through a shared store.
#[async_trait]
pub trait SlideBackend: Send + Sync {
    /// Level count, dimensions, and downsamples.
    fn levels(&self) -> LevelProperties<'_>;

    /// Samples per pixel in buffers returned by [`SlideBackend::read_region`].
    fn channels(&self) -> usize;

    /// Identity used for store equality. `None` if the backend has none.
    fn identity(&self) -> Option<SlideIdentity<'_>>;

    /// Read a `size` region whose top-left corner is `origin` in level-0
    /// coordinates, rendered at `level`.
    async fn read_region(
        &self,
        origin: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<PixelBuffer, SlideError>;

    /// Release the underlying resource. Backends without one ignore this.
    fn close(&self) {}

    /// Vendor metadata, if the backend reads any.
    fn properties(&self) -> Option<&SlideProperties> {
        None
    }
}
