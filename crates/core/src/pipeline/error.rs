//! Pipeline error types.

use thiserror::Error;

use crate::job::{ErrorStage, JobError, JobStatus};
use crate::resources::ResourceError;
use crate::video::VideoError;
use crate::voice::VoiceError;

/// A failure inside a job run. Always ends the job in ERROR; never escapes
/// the controller.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{0}")]
    Voice(#[from] VoiceError),

    #[error("{0}")]
    Video(#[from] VideoError),

    /// Empty overlay pool, missing configuration or missing inputs.
    #[error("{0}")]
    Resource(#[from] ResourceError),

    #[error("{0}")]
    Unexpected(String),
}

impl StageError {
    pub fn stage(&self) -> ErrorStage {
        match self {
            StageError::Voice(_) => ErrorStage::Voice,
            StageError::Video(_) => ErrorStage::Video,
            StageError::Resource(_) => ErrorStage::Resource,
            StageError::Unexpected(_) => ErrorStage::Unexpected,
        }
    }
}

impl From<JobError> for StageError {
    fn from(e: JobError) -> Self {
        StageError::Unexpected(e.to_string())
    }
}

/// Reasons a job could not be run at all.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Job(#[from] JobError),

    /// Only PENDING jobs can be run.
    #[error("Job {job_id} is {status}, not PENDING")]
    NotPending { job_id: String, status: JobStatus },

    /// The execution slot closed while waiting; the job stays PENDING.
    #[error("Pipeline is shutting down")]
    ShuttingDown,
}
