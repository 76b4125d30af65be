//! Decoded tile cache.
//!
//! Tiles are keyed by `(level, tile_x, tile_y)` within one slide. The cache
//! tracks the decoded size of every entry and evicts least-recently-used
//! tiles once the total exceeds its capacity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::trace;

use crate::format::DecodedTile;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Position of a tile in a slide's pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    pub level: usize,
    pub tile_x: u32,
    pub tile_y: u32,
}

impl TileCacheKey {
    pub fn new(level: usize, tile_x: u32, tile_y: u32) -> Self {
        Self {
            level,
            tile_x,
            tile_y,
        }
    }
}

/// Hit and miss counts since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Size-bounded LRU cache of decoded tiles.
pub struct TileCache {
    cache: RwLock<LruCache<TileCacheKey, Arc<DecodedTile>>>,
    max_size: usize,
    current_size: RwLock<usize>,

    /// Present only when statistics were requested
    counters: Option<Counters>,
}

impl TileCache {
    /// Create a cache holding up to `capacity_mb` megabytes of decoded pixels.
    pub fn with_capacity_mb(capacity_mb: usize, record_stats: bool) -> Self {
        Self::with_capacity(capacity_mb.saturating_mul(BYTES_PER_MB), record_stats)
    }

    /// Create a cache holding up to `max_size` bytes of decoded pixels.
    pub fn with_capacity(max_size: usize, record_stats: bool) -> Self {
        Self {
            cache: RwLock::new(LruCache::unbounded()),
            max_size,
            current_size: RwLock::new(0),
            counters: record_stats.then(Counters::default),
        }
    }

    /// Look up a tile and mark it recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Arc<DecodedTile>> {
        let found = self.cache.write().await.get(key).cloned();

        if let Some(counters) = &self.counters {
            let counter = if found.is_some() {
                &counters.hits
            } else {
                &counters.misses
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        match &found {
            Some(_) => trace!(level = key.level, x = key.tile_x, y = key.tile_y, "tile cache hit"),
            None => trace!(level = key.level, x = key.tile_x, y = key.tile_y, "tile cache miss"),
        }
        found
    }

    /// Insert a tile, evicting least-recently-used entries while over capacity.
    pub async fn put(&self, key: TileCacheKey, tile: Arc<DecodedTile>) {
        let tile_size = tile.byte_size();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old) = cache.put(key, tile) {
            *current_size = current_size.saturating_sub(old.byte_size());
        }
        *current_size += tile_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current_size = current_size.saturating_sub(evicted.byte_size());
                }
                None => break,
            }
        }
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Bytes currently held.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Hit and miss counts, `None` when statistics are disabled.
    pub fn stats(&self) -> Option<CacheStats> {
        self.counters.as_ref().map(|c| CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
        })
    }
}
