//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{DownloadId, ImageKey, UploadState};
pub use errors::{MediaError, MediaResult};
pub use ports::{ImageCachePort, TransportPort};
