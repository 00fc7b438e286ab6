//! Media server HTTP client.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode, header, multipart};
use tracing::{debug, warn};
use url::Url;

use crate::domain::entities::{ImageEntry, UploadPayload, UploadReceipt};
use crate::domain::errors::{MediaError, MediaResult};
use crate::domain::ports::{ByteStream, TransportPort};
use crate::infrastructure::config::ServerConfig;

const USER_AGENT: &str = concat!("media-transfer/", env!("CARGO_PKG_VERSION"));

/// Message reported for an accepted upload with an empty response body.
const UPLOAD_OK_MESSAGE: &str = "Success to upload";

/// `reqwest` adapter for the media server.
pub struct MediaServerClient {
    client: Client,
    base_url: Url,
    upload_url: Url,
    list_url: Url,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for MediaServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaServerClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.bearer_token.is_some())
            .finish_non_exhaustive()
    }
}

impl MediaServerClient {
    /// Creates a client from server settings.
    ///
    /// # Errors
    /// Returns `InvalidUrl` for a malformed base URL or path, or `Transport` if the
    /// HTTP client cannot be built.
    pub fn new(config: &ServerConfig) -> MediaResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| MediaError::invalid_url(&config.base_url, e.to_string()))?;
        let upload_url = base_url
            .join(&config.upload_path)
            .map_err(|e| MediaError::invalid_url(&config.upload_path, e.to_string()))?;
        let list_url = base_url
            .join(&config.list_path)
            .map_err(|e| MediaError::invalid_url(&config.list_path, e.to_string()))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MediaError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            upload_url,
            list_url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    /// Returns the server root that relative image paths resolve against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }
}

fn map_send_error(e: &reqwest::Error) -> MediaError {
    warn!(error = %e, "Request to media server failed");
    if e.is_timeout() {
        MediaError::transport("request timed out")
    } else if e.is_connect() {
        MediaError::transport("failed to connect to media server")
    } else {
        MediaError::transport(e.to_string())
    }
}

fn status_error(status: StatusCode) -> MediaError {
    MediaError::http_status(
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown"),
    )
}

/// Server message for an accepted upload; an empty body gets the stock message.
fn upload_message(body: String) -> String {
    if body.trim().is_empty() {
        UPLOAD_OK_MESSAGE.to_string()
    } else {
        body
    }
}

#[async_trait]
impl TransportPort for MediaServerClient {
    async fn fetch(&self, url: &Url) -> MediaResult<ByteStream> {
        debug!(url = %url, "GET image");

        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let expected_len = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| MediaError::transport(format!("failed to read body: {e}"))))
            .boxed();

        Ok(ByteStream {
            expected_len,
            chunks,
        })
    }

    async fn upload(&self, payload: UploadPayload) -> MediaResult<UploadReceipt> {
        let part = multipart::Part::bytes(payload.bytes.to_vec())
            .file_name(payload.file_name)
            .mime_str(UploadPayload::CONTENT_TYPE)
            .map_err(|e| MediaError::transport(format!("invalid content type: {e}")))?;
        let form = multipart::Form::new().part(UploadPayload::FIELD_NAME, part);

        debug!(url = %self.upload_url, "POST image");

        let response = self
            .authorize(self.client.post(self.upload_url.clone()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Upload rejected");
            return Err(MediaError::UploadRejected {
                status: status.as_u16(),
            });
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to read upload response body");
                String::new()
            }
        };
        let message = upload_message(body);

        Ok(UploadReceipt {
            status: status.as_u16(),
            message,
        })
    }

    async fn list_images(&self) -> MediaResult<Vec<ImageEntry>> {
        debug!(url = %self.list_url, "GET image list");

        let response = self
            .authorize(self.client.get(self.list_url.clone()))
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        response
            .json::<Vec<ImageEntry>>()
            .await
            .map_err(|e| MediaError::transport(format!("failed to parse image list: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = MediaServerClient::new(&ServerConfig::default()).unwrap();

        assert_eq!(client.upload_url.as_str(), "http://164.90.163.215:1337/api/upload");
        assert_eq!(
            client.list_url.as_str(),
            "http://164.90.163.215:1337/api/upload/files"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ServerConfig {
            base_url: "not a url".to_string(),
            ..ServerConfig::default()
        };

        let err = MediaServerClient::new(&config).unwrap_err();
        assert!(matches!(err, MediaError::InvalidUrl { .. }));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = ServerConfig {
            bearer_token: Some("secret-token".to_string()),
            ..ServerConfig::default()
        };

        let client = MediaServerClient::new(&config).unwrap();
        let debug = format!("{client:?}");

        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("authenticated: true"));
    }

    #[test]
    fn test_upload_message_falls_back_on_empty_body() {
        assert_eq!(upload_message(String::new()), UPLOAD_OK_MESSAGE);
        assert_eq!(upload_message("  \n".to_string()), UPLOAD_OK_MESSAGE);
        assert_eq!(upload_message("stored".to_string()), "stored");
    }
}
