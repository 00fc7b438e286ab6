//! Port definition for the media server transport.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use url::Url;

use crate::domain::entities::{ImageEntry, UploadPayload, UploadReceipt};
use crate::domain::errors::MediaResult;

/// Body of a GET in flight.
pub struct ByteStream {
    /// Total body length announced by the server, if any.
    pub expected_len: Option<u64>,
    /// Body chunks in arrival order.
    pub chunks: BoxStream<'static, MediaResult<Bytes>>,
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("expected_len", &self.expected_len)
            .finish_non_exhaustive()
    }
}

/// Port for talking to the media server.
/// Implementations apply their own timeouts and auth headers.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Starts a GET and returns the body as a chunk stream.
    /// Non-success statuses are reported here, before any chunk.
    async fn fetch(&self, url: &Url) -> MediaResult<ByteStream>;

    /// Posts a multipart upload. Only HTTP 200 counts as accepted.
    async fn upload(&self, payload: UploadPayload) -> MediaResult<UploadReceipt>;

    /// Fetches the server's image list.
    async fn list_images(&self) -> MediaResult<Vec<ImageEntry>>;
}

#[cfg(test)]
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use futures_util::StreamExt;
    use parking_lot::Mutex;
    use tokio::sync::{Notify, mpsc};

    use crate::domain::errors::MediaError;

    enum Script {
        Body {
            expected_len: Option<u64>,
            chunks: Vec<Bytes>,
        },
        Driven {
            expected_len: Option<u64>,
            rx: mpsc::UnboundedReceiver<MediaResult<Bytes>>,
        },
        Fail(MediaError),
        Panic,
    }

    /// Scripted transport for tests.
    #[derive(Default)]
    pub struct MockTransport {
        scripts: Mutex<HashMap<String, Script>>,
        upload_status: Mutex<Option<u16>>,
        upload_gate: Mutex<Option<Arc<Notify>>>,
        pub uploads: Arc<Mutex<Vec<UploadPayload>>>,
        pub fetched: Arc<Mutex<Vec<String>>>,
        pub listing: Mutex<Vec<ImageEntry>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serves the whole body in fixed-size chunks.
        pub fn with_body(
            self,
            url: &str,
            body: &[u8],
            chunk_size: usize,
            announce_len: bool,
        ) -> Self {
            let chunks = body
                .chunks(chunk_size.max(1))
                .map(Bytes::copy_from_slice)
                .collect();
            let expected_len = announce_len.then_some(body.len() as u64);
            self.scripts.lock().insert(
                url.to_string(),
                Script::Body {
                    expected_len,
                    chunks,
                },
            );
            self
        }

        /// Fails the GET for `url` before any chunk.
        pub fn with_failure(self, url: &str, error: MediaError) -> Self {
            self.scripts
                .lock()
                .insert(url.to_string(), Script::Fail(error));
            self
        }

        /// Makes the transport panic while fetching `url`.
        pub fn with_panic(self, url: &str) -> Self {
            self.scripts.lock().insert(url.to_string(), Script::Panic);
            self
        }

        /// Holds every upload until `gate` is notified.
        pub fn with_upload_gate(self, gate: Arc<Notify>) -> Self {
            *self.upload_gate.lock() = Some(gate);
            self
        }

        /// Lets the test push chunks for `url` one at a time.
        /// Dropping the sender ends the body.
        pub fn driven(
            &self,
            url: &str,
            expected_len: Option<u64>,
        ) -> mpsc::UnboundedSender<MediaResult<Bytes>> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.scripts
                .lock()
                .insert(url.to_string(), Script::Driven { expected_len, rx });
            tx
        }

        /// Makes uploads answer with `status`.
        pub fn with_upload_status(self, status: u16) -> Self {
            *self.upload_status.lock() = Some(status);
            self
        }
    }

    #[async_trait]
    impl TransportPort for MockTransport {
        async fn fetch(&self, url: &Url) -> MediaResult<ByteStream> {
            self.fetched.lock().push(url.to_string());
            let script = self.scripts.lock().remove(url.as_str());
            match script {
                Some(Script::Body {
                    expected_len,
                    chunks,
                }) => Ok(ByteStream {
                    expected_len,
                    chunks: futures_util::stream::iter(chunks.into_iter().map(Ok)).boxed(),
                }),
                Some(Script::Driven { expected_len, rx }) => Ok(ByteStream {
                    expected_len,
                    chunks: futures_util::stream::unfold(rx, |mut rx| async move {
                        rx.recv().await.map(|item| (item, rx))
                    })
                    .boxed(),
                }),
                Some(Script::Fail(error)) => Err(error),
                Some(Script::Panic) => panic!("transport blew up fetching {url}"),
                None => Err(MediaError::http_status(404, "not found")),
            }
        }

        async fn upload(&self, payload: UploadPayload) -> MediaResult<UploadReceipt> {
            let gate = self.upload_gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let status = self.upload_status.lock().unwrap_or(200);
            self.uploads.lock().push(payload);
            if status == 200 {
                Ok(UploadReceipt {
                    status,
                    message: "Success to upload".to_string(),
                })
            } else {
                Err(MediaError::UploadRejected { status })
            }
        }

        async fn list_images(&self) -> MediaResult<Vec<ImageEntry>> {
            Ok(self.listing.lock().clone())
        }
    }
}
