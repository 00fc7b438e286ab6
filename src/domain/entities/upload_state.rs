//! Upload job lifecycle.

use crate::domain::errors::MediaError;

/// Stage of the local processing pipeline for an outgoing image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    /// No job is running.
    #[default]
    Idle,
    /// Source bytes are being fetched.
    LoadingSource,
    /// Source bytes are being re-encoded to fit the size budget.
    Compressing,
    /// Payload is being posted to the server.
    Uploading,
    /// Prepared bytes or a server message are available.
    Ready,
}

impl UploadState {
    /// Returns true while a job holds the pipeline.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::LoadingSource | Self::Compressing | Self::Uploading)
    }

    /// Returns true if moving to `next` keeps the job moving forward.
    /// Falling back to `Idle` is always allowed.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Idle)
                | (Self::Idle | Self::Ready, Self::LoadingSource | Self::Compressing | Self::Uploading)
                | (Self::LoadingSource, Self::Compressing)
                | (Self::Compressing | Self::Uploading, Self::Ready)
        )
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::LoadingSource => write!(f, "loading"),
            Self::Compressing => write!(f, "compressing"),
            Self::Uploading => write!(f, "uploading"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Observable view of the upload pipeline.
#[derive(Debug, Clone, Default)]
pub struct UploadSnapshot {
    /// Current stage.
    pub state: UploadState,
    /// Last server message, set when an upload is accepted.
    pub message: Option<String>,
    /// Last failure, set when a job falls back to idle.
    pub error: Option<MediaError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(UploadState::Idle, UploadState::LoadingSource, true ; "idle_to_loading")]
    #[test_case(UploadState::LoadingSource, UploadState::Compressing, true ; "loading_to_compressing")]
    #[test_case(UploadState::Compressing, UploadState::Ready, true ; "compressing_to_ready")]
    #[test_case(UploadState::Ready, UploadState::Uploading, true ; "ready_to_uploading")]
    #[test_case(UploadState::Uploading, UploadState::Ready, true ; "uploading_to_ready")]
    #[test_case(UploadState::Uploading, UploadState::Idle, true ; "failure_exit")]
    #[test_case(UploadState::Compressing, UploadState::LoadingSource, false ; "no_backwards")]
    #[test_case(UploadState::LoadingSource, UploadState::Uploading, false ; "no_skipping_compression")]
    #[test_case(UploadState::Uploading, UploadState::Compressing, false ; "no_recompress_mid_upload")]
    fn test_transitions(from: UploadState, to: UploadState, allowed: bool) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[test]
    fn test_busy_states() {
        assert!(!UploadState::Idle.is_busy());
        assert!(UploadState::Compressing.is_busy());
        assert!(!UploadState::Ready.is_busy());
    }
}
