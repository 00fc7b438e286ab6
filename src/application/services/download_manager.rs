//! Concurrent per-URL downloads with progress reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use super::transfer_registry::TransferRegistry;
use crate::domain::entities::{DownloadId, ImageKey};
use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::{ImageCachePort, TransportPort};

/// Caller side of one transfer.
///
/// Progress arrives as non-decreasing fractions; the stream ends right before
/// the result becomes available.
#[derive(Debug)]
pub struct DownloadHandle {
    id: DownloadId,
    url: String,
    progress: mpsc::UnboundedReceiver<f32>,
    result: oneshot::Receiver<MediaResult<Bytes>>,
}

impl DownloadHandle {
    /// Returns the transfer identifier.
    #[must_use]
    pub const fn id(&self) -> DownloadId {
        self.id
    }

    /// Returns the URL as requested by the caller.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Waits for the next progress value. `None` once the transfer is resolved.
    pub async fn next_progress(&mut self) -> Option<f32> {
        self.progress.recv().await
    }

    /// Waits for the terminal result, discarding any unread progress.
    ///
    /// # Errors
    /// Returns the transfer's failure, or `Cancelled` if it was aborted.
    pub async fn wait(self) -> MediaResult<Bytes> {
        self.result.await.unwrap_or(Err(MediaError::Cancelled))
    }

    /// Splits the handle into its progress stream and result future.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<f32>,
        oneshot::Receiver<MediaResult<Bytes>>,
    ) {
        (self.progress, self.result)
    }
}

/// Owns every in-flight download and maps transport events onto handles.
pub struct DownloadManager {
    transport: Arc<dyn TransportPort>,
    cache: Option<Arc<dyn ImageCachePort>>,
    base_url: Option<Url>,
    registry: Arc<TransferRegistry>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("base_url", &self.base_url)
            .field("active", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    /// Creates a manager that only accepts absolute URLs.
    #[must_use]
    pub fn new(transport: Arc<dyn TransportPort>) -> Self {
        Self {
            transport,
            cache: None,
            base_url: None,
            registry: Arc::new(TransferRegistry::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Resolves server-relative paths such as `/uploads/a.jpg` against `base_url`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Decodes completed downloads and stores them in `cache` under their URL.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ImageCachePort>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Starts downloading `url` in the background.
    ///
    /// A URL that cannot be parsed yields a handle already resolved with `InvalidUrl`.
    /// Must be called from within a Tokio runtime.
    pub fn start_download(&self, url: &str) -> DownloadHandle {
        let id = DownloadId::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        let resolved = match self.resolve_url(url) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(id = %id, url, error = %e, "Rejected download");
                let (_, progress) = mpsc::unbounded_channel();
                let (result_tx, result) = oneshot::channel();
                let _ = result_tx.send(Err(e));
                return DownloadHandle {
                    id,
                    url: url.to_string(),
                    progress,
                    result,
                };
            }
        };

        let (progress, result) = self.registry.register(id, url);
        debug!(id = %id, url = %resolved, "Starting download");

        let worker = TransferWorker {
            registry: self.registry.clone(),
            transport: self.transport.clone(),
            cache: self.cache.clone(),
        };
        let key = ImageKey::new(url);
        let task = tokio::spawn(async move { worker.run(id, resolved, key).await });
        self.registry.attach_abort(id, task.abort_handle());

        DownloadHandle {
            id,
            url: url.to_string(),
            progress,
            result,
        }
    }

    /// Cancels a transfer. Returns false if it had already been resolved.
    pub fn cancel(&self, id: DownloadId) -> bool {
        let cancelled = self.registry.cancel(id);
        if cancelled {
            info!(id = %id, "Download cancelled");
        }
        cancelled
    }

    /// Cancels every in-flight transfer.
    pub fn cancel_all(&self) -> usize {
        let count = self.registry.cancel_all();
        if count > 0 {
            info!(count, "Cancelled all downloads");
        }
        count
    }

    /// Returns true if `id` has not been resolved yet.
    #[must_use]
    pub fn is_active(&self, id: DownloadId) -> bool {
        self.registry.contains(id)
    }

    /// Returns the number of transfers awaiting resolution.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    fn resolve_url(&self, url: &str) -> MediaResult<Url> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(MediaError::invalid_url(url, "empty url"));
        }
        match Url::parse(trimmed) {
            Ok(parsed) => Ok(parsed),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self
                    .base_url
                    .as_ref()
                    .ok_or_else(|| MediaError::invalid_url(url, "relative url without base"))?;
                base.join(trimmed)
                    .map_err(|e| MediaError::invalid_url(url, e.to_string()))
            }
            Err(e) => Err(MediaError::invalid_url(url, e.to_string())),
        }
    }
}

/// State moved into each transfer task.
struct TransferWorker {
    registry: Arc<TransferRegistry>,
    transport: Arc<dyn TransportPort>,
    cache: Option<Arc<dyn ImageCachePort>>,
}

/// Resolves the transfer with a failure if its task ends without resolving it,
/// e.g. when the transport panics. A no-op after cancellation or normal completion.
struct ResolveOnDrop {
    registry: Arc<TransferRegistry>,
    id: DownloadId,
}

impl Drop for ResolveOnDrop {
    fn drop(&mut self) {
        let outcome = Err(MediaError::transport("download task stopped before completing"));
        if self.registry.resolve(self.id, outcome) {
            warn!(id = %self.id, "Download task ended without a result");
        }
    }
}

impl TransferWorker {
    async fn run(self, id: DownloadId, url: Url, key: ImageKey) {
        let _guard = ResolveOnDrop {
            registry: self.registry.clone(),
            id,
        };
        let mut outcome = self.transfer(id, &url).await;

        if let Some(cache) = &self.cache {
            outcome = match outcome {
                Ok(bytes) => write_through(cache.as_ref(), key, bytes.clone())
                    .await
                    .map(|()| bytes),
                Err(e) => Err(e),
            };
        }

        match &outcome {
            Ok(bytes) => info!(id = %id, size = bytes.len(), "Download finished"),
            Err(e) => warn!(id = %id, error = %e, "Download failed"),
        }
        self.registry.resolve(id, outcome);
    }

    async fn transfer(&self, id: DownloadId, url: &Url) -> MediaResult<Bytes> {
        let mut body = self.transport.fetch(url).await?;

        let total = body.expected_len.filter(|len| *len > 0);
        if total.is_some() {
            self.registry.enable_progress(id);
        }

        #[allow(clippy::cast_possible_truncation)]
        let mut buf = BytesMut::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        while let Some(chunk) = body.chunks.next().await {
            buf.extend_from_slice(&chunk?);

            #[allow(clippy::cast_precision_loss)]
            let live = match total {
                Some(total) => self
                    .registry
                    .publish_progress(id, buf.len() as f32 / total as f32),
                None => self.registry.contains(id),
            };
            if !live {
                return Err(MediaError::Cancelled);
            }
        }

        Ok(buf.freeze())
    }
}

async fn write_through(
    cache: &dyn ImageCachePort,
    key: ImageKey,
    bytes: Bytes,
) -> MediaResult<()> {
    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| MediaError::decode(format!("decode task panicked: {e}")))?
        .map_err(|e| MediaError::decode(e.to_string()))?;
    cache.put(key, Arc::new(decoded)).await;
    Ok(())
}
