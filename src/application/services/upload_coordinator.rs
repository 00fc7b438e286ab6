//! Upload pipeline for a single outgoing image.
//!
//! Sequences fetch-or-reuse, compression and upload, publishing each stage as an
//! [`UploadSnapshot`] on a watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::download_manager::DownloadManager;
use crate::domain::entities::{
    DownloadId, ImageKey, UploadPayload, UploadReceipt, UploadSnapshot, UploadState,
};
use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::{ImageCachePort, TransportPort};
use crate::infrastructure::image::JpegCompressor;

/// Image bytes ready to be uploaded.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Bytes to send; compressed unless compression failed.
    pub bytes: Bytes,
    /// Key the image is known by in the cache and the image list.
    pub key: ImageKey,
    /// JPEG quality used, or `None` when the source bytes are forwarded as-is.
    pub quality: Option<f32>,
}

/// Drives one upload job at a time through `idle -> loading -> compressing -> uploading -> ready`.
pub struct UploadCoordinator {
    downloads: Arc<DownloadManager>,
    transport: Arc<dyn TransportPort>,
    cache: Arc<dyn ImageCachePort>,
    compressor: JpegCompressor,
    snapshot: watch::Sender<UploadSnapshot>,
    job: AtomicU64,
    active_download: Mutex<Option<DownloadId>>,
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("state", &self.state())
            .field("compressor", &self.compressor)
            .finish_non_exhaustive()
    }
}

impl UploadCoordinator {
    /// Creates a coordinator in the idle state.
    #[must_use]
    pub fn new(
        downloads: Arc<DownloadManager>,
        transport: Arc<dyn TransportPort>,
        cache: Arc<dyn ImageCachePort>,
        compressor: JpegCompressor,
    ) -> Self {
        let (snapshot, _) = watch::channel(UploadSnapshot::default());
        Self {
            downloads,
            transport,
            cache,
            compressor,
            snapshot,
            job: AtomicU64::new(0),
            active_download: Mutex::new(None),
        }
    }

    /// Subscribes to pipeline snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.snapshot.subscribe()
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> UploadSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns the current stage.
    #[must_use]
    pub fn state(&self) -> UploadState {
        self.snapshot.borrow().state
    }

    /// Fetches a remote image and compresses it for upload.
    ///
    /// # Errors
    /// Returns `JobInProgress` if another job holds the pipeline, or the download's
    /// failure. Either way a failed download leaves the pipeline idle.
    pub async fn load_source(&self, url: &str) -> MediaResult<PreparedImage> {
        let job = self.begin(UploadState::LoadingSource)?;

        let handle = self.downloads.start_download(url);
        let download = handle.id();
        *self.active_download.lock() = Some(download);
        let fetched = handle.wait().await;
        self.release_download(download);

        let raw = match fetched {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(job, e)),
        };

        self.advance(job, UploadState::Compressing);
        let prepared = self.compress(raw, ImageKey::new(url)).await;
        self.finish(job, None);
        Ok(prepared)
    }

    /// Prepares an image picked from the local gallery.
    ///
    /// The decoded image is stored in the cache under `url`, or under a fresh
    /// unique key when no URL was given, and that key is returned in the result.
    ///
    /// # Errors
    /// Returns `JobInProgress` if another job holds the pipeline, or `Decode` if
    /// `raw` is not an image.
    pub async fn prepare_local(
        &self,
        raw: Bytes,
        url: Option<&str>,
    ) -> MediaResult<PreparedImage> {
        let job = self.begin(UploadState::LoadingSource)?;

        let key = ImageKey::from_optional_url(url);
        let input = raw.clone();
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&input))
            .await
            .map_err(|e| MediaError::decode(format!("decode task panicked: {e}")))
            .and_then(|res| res.map_err(|e| MediaError::decode(e.to_string())));

        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e) => return Err(self.fail(job, e)),
        };
        self.cache.put(key.clone(), Arc::new(decoded)).await;
        debug!(key = %key, "Cached local capture");

        self.advance(job, UploadState::Compressing);
        let prepared = self.compress(raw, key).await;
        self.finish(job, None);
        Ok(prepared)
    }

    /// Uploads prepared bytes.
    ///
    /// # Errors
    /// Returns `JobInProgress` if another job holds the pipeline, or the transport's
    /// failure (`UploadRejected` for non-200 answers). Failures leave the pipeline idle.
    pub async fn upload(&self, bytes: Bytes) -> MediaResult<UploadReceipt> {
        let job = self.begin(UploadState::Uploading)?;

        let payload = UploadPayload::new(bytes);
        debug!(file = %payload.file_name, size = payload.bytes.len(), "Uploading image");

        match self.transport.upload(payload).await {
            Ok(receipt) => {
                info!(status = receipt.status, "Upload accepted");
                self.finish(job, Some(receipt.message.clone()));
                Ok(receipt)
            }
            Err(e) => Err(self.fail(job, e)),
        }
    }

    /// Aborts a running source download. Returns false if none was running.
    pub fn cancel(&self) -> bool {
        let id = *self.active_download.lock();
        id.is_some_and(|id| self.downloads.cancel(id))
    }

    /// Returns the pipeline to idle, cancelling any source download.
    ///
    /// A job still running when this is called is detached: it finishes on its
    /// own but no longer touches the snapshot.
    pub fn reset(&self) {
        let detached = self.active_download.lock().take();
        self.snapshot.send_modify(|snap| {
            self.job.fetch_add(1, Ordering::AcqRel);
            *snap = UploadSnapshot::default();
        });
        if let Some(id) = detached {
            self.downloads.cancel(id);
        }
        debug!("Upload pipeline reset");
    }

    /// Runs the compressor on the blocking pool. Compression failures forward the
    /// source bytes unchanged so the image is still uploaded.
    async fn compress(&self, raw: Bytes, key: ImageKey) -> PreparedImage {
        let compressor = self.compressor;
        let input = raw.clone();
        let result = tokio::task::spawn_blocking(move || compressor.compress(&input)).await;

        match result {
            Ok(Ok(result)) => PreparedImage {
                quality: Some(result.quality()),
                bytes: result.bytes,
                key,
            },
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Compression failed, forwarding original bytes");
                PreparedImage {
                    bytes: raw,
                    key,
                    quality: None,
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Compression task panicked, forwarding original bytes");
                PreparedImage {
                    bytes: raw,
                    key,
                    quality: None,
                }
            }
        }
    }

    /// Claims the pipeline for a new job and returns its generation.
    fn begin(&self, first: UploadState) -> MediaResult<u64> {
        let mut outcome = Err(MediaError::JobInProgress {
            state: String::new(),
        });
        self.snapshot.send_if_modified(|snap| {
            if snap.state.is_busy() || !snap.state.can_advance_to(first) {
                outcome = Err(MediaError::JobInProgress {
                    state: snap.state.to_string(),
                });
                return false;
            }
            let job = self.job.fetch_add(1, Ordering::AcqRel) + 1;
            debug!(job, from = %snap.state, to = %first, "Upload job started");
            snap.state = first;
            snap.message = None;
            snap.error = None;
            outcome = Ok(job);
            true
        });
        outcome
    }

    /// Moves `job` forward. Ignored once the job has been detached by a reset.
    fn advance(&self, job: u64, next: UploadState) {
        self.update(job, |snap| {
            if !snap.state.can_advance_to(next) {
                return false;
            }
            debug!(job, from = %snap.state, to = %next, "Upload state change");
            snap.state = next;
            true
        });
    }

    fn finish(&self, job: u64, message: Option<String>) {
        self.update(job, |snap| {
            if !snap.state.can_advance_to(UploadState::Ready) {
                return false;
            }
            snap.state = UploadState::Ready;
            snap.message = message;
            true
        });
    }

    fn fail(&self, job: u64, error: MediaError) -> MediaError {
        warn!(job, error = %error, "Upload job failed");
        let reported = error.clone();
        self.update(job, |snap| {
            snap.state = UploadState::Idle;
            snap.error = Some(reported);
            true
        });
        error
    }

    /// Applies `change` only while `job` still owns the pipeline.
    fn update(&self, job: u64, change: impl FnOnce(&mut UploadSnapshot) -> bool) {
        self.snapshot.send_if_modified(|snap| {
            if self.job.load(Ordering::Acquire) != job {
                trace!(job, "Ignoring update from detached upload job");
                return false;
            }
            change(snap)
        });
    }

    fn release_download(&self, id: DownloadId) {
        let mut active = self.active_download.lock();
        if *active == Some(id) {
            *active = None;
        }
    }
}
