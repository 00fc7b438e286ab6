//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching with LRU eviction bounded by count and decoded size
//! - Adaptive JPEG compression to a byte budget

pub mod compressor;
pub mod memory_cache;

pub use compressor::{CompressionResult, JpegCompressor};
pub use memory_cache::{CacheStats, MemoryImageCache};
