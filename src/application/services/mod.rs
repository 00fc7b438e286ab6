//! Application services.

mod download_manager;
mod transfer_registry;
mod upload_coordinator;

pub use download_manager::{DownloadHandle, DownloadManager};
pub use transfer_registry::TransferRegistry;
pub use upload_coordinator::{PreparedImage, UploadCoordinator};
