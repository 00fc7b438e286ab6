//! Application layer orchestrating transfers over the domain ports.

/// Download and upload services.
pub mod services;

pub use services::{DownloadHandle, DownloadManager, PreparedImage, UploadCoordinator};
