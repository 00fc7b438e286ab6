//! In-memory LRU image cache implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::ImageKey;
use crate::domain::ports::ImageCachePort;

/// Default maximum number of images to cache in memory.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Default budget for decoded pixel data (64 MiB).
pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// In-memory LRU cache for decoded images.
/// Bounded both by entry count and by the decoded size of the images it holds.
pub struct MemoryImageCache {
    cache: Arc<RwLock<LruCache<ImageKey, Arc<image::DynamicImage>>>>,
    max_bytes: usize,
    current_bytes: AtomicUsize,
    entries: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Decoded size of an image, used as its eviction cost.
fn image_cost(image: &image::DynamicImage) -> usize {
    image.as_bytes().len()
}

impl MemoryImageCache {
    /// Creates a new cache with the specified capacity and byte budget.
    #[must_use]
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(cap))),
            max_bytes,
            current_bytes: AtomicUsize::new(0),
            entries: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a new cache with the default limits.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CACHE_SIZE, DEFAULT_MAX_BYTES)
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
            bytes: self.current_bytes.load(Ordering::Relaxed),
        }
    }

    /// Peeks at an image without promoting it in the LRU.
    pub async fn peek(&self, key: &ImageKey) -> Option<Arc<image::DynamicImage>> {
        let cache = self.cache.read().await;
        cache.peek(key).cloned()
    }

    /// Returns the decoded size of everything currently cached.
    #[must_use]
    pub fn cost(&self) -> usize {
        self.current_bytes.load(Ordering::Relaxed)
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Decoded bytes currently held.
    pub bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({} KiB), {:.1}% hit rate ({} hits, {} misses)",
            self.size,
            self.bytes / 1024,
            self.hit_rate,
            self.hits,
            self.misses
        )
    }
}

#[async_trait::async_trait]
impl ImageCachePort for MemoryImageCache {
    async fn get(&self, key: &ImageKey) -> Option<Arc<image::DynamicImage>> {
        let mut cache = self.cache.write().await;
        if let Some(img) = cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(img.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    async fn put(&self, key: ImageKey, image: Arc<image::DynamicImage>) {
        let cost = image_cost(&image);
        let mut cache = self.cache.write().await;
        debug!(key = %key, cost, "Storing image in memory cache");

        let mut bytes = self.current_bytes.load(Ordering::Relaxed) + cost;
        // `push` reports the entry it displaced: either the old value for this
        // key or the LRU entry dropped by the count bound.
        if let Some((_, displaced)) = cache.push(key, image) {
            bytes -= image_cost(&displaced);
        }

        while bytes > self.max_bytes && cache.len() > 1 {
            match cache.pop_lru() {
                Some((old_key, old)) => {
                    bytes -= image_cost(&old);
                    debug!(key = %old_key, "Evicted image over byte budget");
                }
                None => break,
            }
        }

        self.current_bytes.store(bytes, Ordering::Relaxed);
        self.entries.store(cache.len(), Ordering::Relaxed);
    }

    async fn evict(&self, key: &ImageKey) {
        let mut cache = self.cache.write().await;
        if let Some(old) = cache.pop(key) {
            self.current_bytes
                .fetch_sub(image_cost(&old), Ordering::Relaxed);
            self.entries.store(cache.len(), Ordering::Relaxed);
            debug!(key = %key, "Evicted image from memory cache");
        }
    }

    fn len(&self) -> usize {
        // Kept in step with the LRU under its write lock.
        self.entries.load(Ordering::Relaxed)
    }

    async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
        self.current_bytes.store(0, Ordering::Relaxed);
        self.entries.store(0, Ordering::Relaxed);
        debug!("Cleared memory image cache");
    }
}
