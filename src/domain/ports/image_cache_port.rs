//! Port definition for image caching.

use std::sync::Arc;

use crate::domain::entities::ImageKey;

/// Port for in-memory image caching.
/// Implementations must be thread-safe and must never hand out a partially written value.
#[async_trait::async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Attempts to get an image from the cache.
    /// Returns None if not cached or already evicted.
    async fn get(&self, key: &ImageKey) -> Option<Arc<image::DynamicImage>>;

    /// Stores an image in the cache, replacing any previous value for the key.
    async fn put(&self, key: ImageKey, image: Arc<image::DynamicImage>);

    /// Removes an image from the cache.
    async fn evict(&self, key: &ImageKey);

    /// Returns the current number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all images from the cache.
    async fn clear(&self);
}
