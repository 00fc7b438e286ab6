//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Media server HTTP client.
pub mod http;
/// Image caching and compression.
pub mod image;

pub use config::{AppConfig, CliArgs, Command, ConfigError, LogLevel, ConfigStore};
pub use http::MediaServerClient;
pub use self::image::{CacheStats, CompressionResult, JpegCompressor, MemoryImageCache};
