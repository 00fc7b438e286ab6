//! Media transfer error types.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// Media transfer error variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum MediaError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("transport failure{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("not a decodable image: {message}")]
    Decode { message: String },

    #[error("failed to encode image: {message}")]
    Encode { message: String },

    #[error("transfer cancelled")]
    Cancelled,

    #[error("upload rejected by server with HTTP {status}")]
    UploadRejected { status: u16 },

    #[error("another upload job is {state}")]
    JobInProgress { state: String },
}

impl MediaError {
    /// Creates invalid url error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates transport error without a status code.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Creates transport error for a non-success HTTP status.
    #[must_use]
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates encode error.
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Returns whether the error comes from a user-initiated abort.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { status: None, .. } | Self::JobInProgress { .. } => true,
            Self::Transport {
                status: Some(status),
                ..
            }
            | Self::UploadRejected { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns the HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::UploadRejected { status } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_with_status() {
        let err = MediaError::http_status(404, "not found");
        assert_eq!(err.to_string(), "transport failure (HTTP 404): not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_transport_display_without_status() {
        let err = MediaError::transport("connection reset");
        assert_eq!(err.to_string(), "transport failure: connection reset");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(MediaError::Cancelled.is_cancelled());
        assert!(!MediaError::decode("garbage").is_cancelled());
        assert!(!MediaError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_rejected_recoverability() {
        assert!(MediaError::UploadRejected { status: 503 }.is_recoverable());
        assert!(!MediaError::UploadRejected { status: 413 }.is_recoverable());
    }
}
