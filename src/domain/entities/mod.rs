//! Domain entities.

mod image;
mod upload_state;

pub use self::image::{DownloadId, ImageCatalog, ImageEntry, ImageKey, UploadPayload, UploadReceipt};
pub use upload_state::{UploadSnapshot, UploadState};
