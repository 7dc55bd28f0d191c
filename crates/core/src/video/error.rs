//! Video stage errors.

use thiserror::Error;

use crate::placer::PlacerError;
use crate::resources::ResourceError;

#[derive(Debug, Error)]
pub enum VideoError {
    /// A single HTTP request exceeded its timeout.
    #[error("Video service request timed out")]
    RequestTimeout,

    #[error("Video service unreachable: {0}")]
    ConnectionFailed(String),

    #[error("Video service error: {0}")]
    ServiceError(String),

    /// The service answered with something we cannot use.
    #[error("Invalid response from video service: {0}")]
    InvalidResponse(String),

    /// The service reported the render as failed.
    #[error("Render task {task_id} failed: {message}")]
    RenderFailed { task_id: String, message: String },

    /// Polling budget exhausted without a terminal status.
    #[error("Render task {task_id} did not finish after {attempts} status checks")]
    Timeout { task_id: String, attempts: u32 },

    #[error("Failed to move render output: {0}")]
    Relocation(#[from] PlacerError),

    #[error("Failed to consume overlay: {0}")]
    Overlay(#[from] ResourceError),
}

impl VideoError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VideoError::RequestTimeout
        } else if e.is_connect() {
            VideoError::ConnectionFailed(e.to_string())
        } else {
            VideoError::ServiceError(e.to_string())
        }
    }

    /// Label used in metrics.
    pub fn metric_status(&self) -> &'static str {
        match self {
            VideoError::RequestTimeout | VideoError::Timeout { .. } => "timeout",
            _ => "error",
        }
    }
}
