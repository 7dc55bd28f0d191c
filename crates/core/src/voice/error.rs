//! Voice stage errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::placer::PlacerError;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Voice service request timed out")]
    Timeout,

    #[error("Voice service unreachable: {0}")]
    ConnectionFailed(String),

    /// Non-2xx response or a transport failure other than timeout/connect.
    #[error("Voice service error: {0}")]
    ServiceError(String),

    /// The service reported success but an expected output file is absent.
    #[error("Voice artifact missing: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Failed to move voice artifact: {0}")]
    Relocation(#[from] PlacerError),
}

impl VoiceError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VoiceError::Timeout
        } else if e.is_connect() {
            VoiceError::ConnectionFailed(e.to_string())
        } else {
            VoiceError::ServiceError(e.to_string())
        }
    }

    /// Label used in metrics.
    pub fn metric_status(&self) -> &'static str {
        match self {
            VoiceError::Timeout => "timeout",
            _ => "error",
        }
    }
}
