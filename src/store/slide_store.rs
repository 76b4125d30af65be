use std::collections::btree_map;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tracing::debug;

use crate::config::StoreOptions;
use crate::error::{LookupError, SlideError, StoreError};
use crate::slide::{open_slide, SlideBackend};

use super::chunk_key::parse_chunk_key;
use super::metadata::{create_meta_store, MetaStore};

/// A slide presented as a read-only Zarr v2 key/value store.
///
/// Metadata documents are built once at construction. Chunks are read from
/// the backend on every lookup and never cached here. Dropping the store
/// closes the backend.
pub struct SlideStore {
    backend: Box<dyn SlideBackend>,
    tile_size: u32,
    metadata: MetaStore,
    closed: AtomicBool,
}

impl SlideStore {
    /// Open the slide at `path` with the backend chosen in `options`.
    pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        options.validate()?;
        let path = path.as_ref();
        let backend = open_slide(options.backend, path, &options).await?;

        debug!(
            slide = %path.display(),
            backend = options.backend.name(),
            tile_size = options.tile_size,
            "opened slide store"
        );
        Self::from_backend(backend, options.tile_size)
    }

    /// Wrap an already opened backend.
    pub fn from_backend(
        backend: Box<dyn SlideBackend>,
        tile_size: u32,
    ) -> Result<Self, StoreError> {
        if tile_size == 0 {
            return Err(StoreError::InvalidTileSize(tile_size));
        }
        let metadata = create_meta_store(backend.as_ref(), tile_size)?;

        Ok(Self {
            backend,
            tile_size,
            metadata,
            closed: AtomicBool::new(false),
        })
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn backend(&self) -> &dyn SlideBackend {
        self.backend.as_ref()
    }

    pub fn metadata(&self) -> &MetaStore {
        &self.metadata
    }

    /// Level-0 pixel origin of a chunk, `None` for an unknown level.
    ///
    /// Computed as `trunc(col * downsample * tile_size)` and likewise for the
    /// row.
    pub fn chunk_origin(&self, col: u64, row: u64, level: usize) -> Option<(u64, u64)> {
        let downsample = self.backend.levels().downsample(level)?;
        let step = downsample * self.tile_size as f64;
        Some(((col as f64 * step) as u64, (row as f64 * step) as u64))
    }

    /// Look up a metadata document or read a chunk.
    ///
    /// Metadata keys return their stored bytes. Any other key is parsed as
    /// `<level>/<row>.<col>.<group>` and read from the slide as a
    /// `tile_size` square. A closed slide is reported as
    /// [`LookupError::ResourceClosed`]; every other failure is
    /// [`LookupError::ChunkUnavailable`].
    pub async fn get(&self, key: &str) -> Result<Bytes, LookupError> {
        if let Some(doc) = self.metadata.get(key) {
            return Ok(doc.clone());
        }

        let unavailable = || LookupError::ChunkUnavailable {
            key: key.to_string(),
        };

        let coord = parse_chunk_key(key).map_err(|_| unavailable())?;
        let origin = self
            .chunk_origin(coord.col, coord.row, coord.level)
            .ok_or_else(unavailable)?;

        let size = (self.tile_size, self.tile_size);
        match self.backend.read_region(origin, coord.level, size).await {
            Ok(region) => Ok(region.into_bytes()),
            Err(err) => Err(self.lookup_error(key, &err)),
        }
    }

    fn lookup_error(&self, key: &str, err: &SlideError) -> LookupError {
        let key = key.to_string();
        if err.is_closed() {
            LookupError::ResourceClosed { key }
        } else {
            LookupError::ChunkUnavailable { key }
        }
    }

    /// Whether `key` is a metadata key. Chunk keys are never reported.
    pub fn contains(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Metadata keys in sorted order.
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            inner: self.metadata.keys(),
        }
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Close the backend. Only the first call reaches it; backends without a
    /// close operation keep serving reads.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.backend.close();
        debug!(identity = ?self.backend.identity(), "closed slide store");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for SlideStore {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stores are equal when their backends have the same kind of identity with
/// the same value. Without an identity there is no verdict, so the
/// comparison is false.
impl PartialEq for SlideStore {
    fn eq(&self, other: &Self) -> bool {
        match (self.backend.identity(), other.backend.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for SlideStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideStore")
            .field("identity", &self.backend.identity())
            .field("tile_size", &self.tile_size)
            .field("keys", &self.metadata.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Iterator over a store's metadata keys.
#[derive(Debug, Clone)]
pub struct Keys<'a> {
    inner: btree_map::Keys<'a, String, Bytes>,
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(String::as_str)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Keys<'_> {}

impl<'a> IntoIterator for &'a SlideStore {
    type Item = &'a str;
    type IntoIter = Keys<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys()
    }
}
