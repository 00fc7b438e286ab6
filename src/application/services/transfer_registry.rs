//! Index of in-flight transfers.
//!
//! The registry is the only writer to a transfer's progress channel and result slot.
//! Every publish happens under its lock, so a transfer removed by cancellation can
//! never emit another progress value, and whichever of completion or cancellation
//! removes the entry first is the one that resolves the handle.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::trace;

use crate::domain::entities::DownloadId;
use crate::domain::errors::{MediaError, MediaResult};

/// Registry side of one transfer.
struct Transfer {
    url: String,
    progress_tx: mpsc::UnboundedSender<f32>,
    result_tx: oneshot::Sender<MediaResult<Bytes>>,
    last_progress: f32,
    reports_progress: bool,
    abort: Option<AbortHandle>,
}

/// Concurrent map from task identifier to the transfer it drives.
#[derive(Default)]
pub struct TransferRegistry {
    transfers: Mutex<HashMap<DownloadId, Transfer>>,
}

impl TransferRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transfer and returns the receiving halves for its handle.
    pub fn register(
        &self,
        id: DownloadId,
        url: impl Into<String>,
    ) -> (
        mpsc::UnboundedReceiver<f32>,
        oneshot::Receiver<MediaResult<Bytes>>,
    ) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let transfer = Transfer {
            url: url.into(),
            progress_tx,
            result_tx,
            last_progress: 0.0,
            reports_progress: false,
            abort: None,
        };
        self.transfers.lock().insert(id, transfer);
        (progress_rx, result_rx)
    }

    /// Remembers how to abort the task driving `id`.
    /// If the transfer already finished the task is left alone.
    pub fn attach_abort(&self, id: DownloadId, abort: AbortHandle) {
        if let Some(transfer) = self.transfers.lock().get_mut(&id) {
            transfer.abort = Some(abort);
        }
    }

    /// Marks the transfer as one with a known total, enabling progress events.
    pub fn enable_progress(&self, id: DownloadId) {
        if let Some(transfer) = self.transfers.lock().get_mut(&id) {
            transfer.reports_progress = true;
        }
    }

    /// Publishes a progress fraction. Values are clamped to `[0.0, 1.0]` and
    /// anything lower than the last published value is dropped.
    ///
    /// Returns false once the transfer is no longer registered.
    pub fn publish_progress(&self, id: DownloadId, fraction: f32) -> bool {
        let mut transfers = self.transfers.lock();
        let Some(transfer) = transfers.get_mut(&id) else {
            return false;
        };
        if !transfer.reports_progress {
            return true;
        }

        let fraction = fraction.clamp(0.0, 1.0);
        if fraction > transfer.last_progress {
            transfer.last_progress = fraction;
            let _ = transfer.progress_tx.send(fraction);
            trace!(id = %id, progress = fraction, "Download progress");
        }
        true
    }

    /// Delivers the terminal result and removes the transfer.
    ///
    /// Returns false if the transfer had already been resolved, in which case
    /// `outcome` is discarded.
    pub fn resolve(&self, id: DownloadId, outcome: MediaResult<Bytes>) -> bool {
        let Some(transfer) = self.transfers.lock().remove(&id) else {
            trace!(id = %id, "Transfer already resolved, dropping outcome");
            return false;
        };

        if outcome.is_ok() && transfer.reports_progress && transfer.last_progress < 1.0 {
            let _ = transfer.progress_tx.send(1.0);
        }
        // Closing the progress channel before the result is sent keeps every
        // progress event ahead of the terminal resolution.
        drop(transfer.progress_tx);
        let _ = transfer.result_tx.send(outcome);
        true
    }

    /// Cancels the transfer, aborting its task.
    ///
    /// Returns false if it had already been resolved.
    pub fn cancel(&self, id: DownloadId) -> bool {
        let Some(transfer) = self.transfers.lock().remove(&id) else {
            return false;
        };
        if let Some(abort) = &transfer.abort {
            abort.abort();
        }
        trace!(id = %id, url = %transfer.url, "Transfer cancelled");
        drop(transfer.progress_tx);
        let _ = transfer.result_tx.send(Err(MediaError::Cancelled));
        true
    }

    /// Cancels every registered transfer and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<DownloadId> = self.transfers.lock().keys().copied().collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Returns true while `id` is awaiting its terminal resolution.
    #[must_use]
    pub fn contains(&self, id: DownloadId) -> bool {
        self.transfers.lock().contains_key(&id)
    }

    /// Returns the number of unresolved transfers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transfers.lock().len()
    }

    /// Returns true if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exactly_once() {
        let registry = TransferRegistry::new();
        let id = DownloadId::new(1);
        let (_progress, mut result) = registry.register(id, "u");

        assert!(registry.resolve(id, Ok(Bytes::from_static(b"ok"))));
        assert!(!registry.resolve(id, Err(MediaError::transport("late"))));
        assert!(!registry.cancel(id));
        assert!(registry.is_empty());

        assert_eq!(result.try_recv().unwrap().unwrap(), Bytes::from_static(b"ok"));
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let registry = TransferRegistry::new();
        let id = DownloadId::new(1);
        let (mut progress, _result) = registry.register(id, "u");
        registry.enable_progress(id);

        for value in [0.2, 0.1, 0.5, 0.5, 7.0] {
            registry.publish_progress(id, value);
        }
        registry.resolve(id, Ok(Bytes::new()));

        let mut seen = Vec::new();
        while let Ok(value) = progress.try_recv() {
            seen.push(value);
        }
        assert_eq!(seen, vec![0.2, 0.5, 1.0]);
    }

    #[test]
    fn test_progress_suppressed_without_total() {
        let registry = TransferRegistry::new();
        let id = DownloadId::new(1);
        let (mut progress, _result) = registry.register(id, "u");

        assert!(registry.publish_progress(id, 0.5));
        registry.resolve(id, Ok(Bytes::new()));

        assert!(progress.try_recv().is_err());
    }

    #[test]
    fn test_cancel_closes_progress_and_resolves_cancelled() {
        let registry = TransferRegistry::new();
        let id = DownloadId::new(9);
        let (mut progress, mut result) = registry.register(id, "u");
        registry.enable_progress(id);

        assert!(registry.cancel(id));
        assert!(!registry.publish_progress(id, 0.9));

        assert!(matches!(
            progress.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(result.try_recv().unwrap(), Err(MediaError::Cancelled));
    }

    #[test]
    fn test_cancel_all_counts_live_transfers() {
        let registry = TransferRegistry::new();
        let mut receivers = Vec::new();
        for raw in 0..3 {
            receivers.push(registry.register(DownloadId::new(raw), "u"));
        }
        registry.resolve(DownloadId::new(0), Ok(Bytes::new()));

        assert_eq!(registry.cancel_all(), 2);
        assert!(registry.is_empty());
    }
}
