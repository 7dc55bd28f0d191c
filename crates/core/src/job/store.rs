//! Job storage trait and types.

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::types::{JobStatus, JobUpdate, NewJob, ScriptJob};

/// Error type for job operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The requested status change is not an edge of the state machine.
    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// COMPLETED and ERROR records are frozen.
    #[error("Job {job_id} is {status} and can no longer change")]
    Finished { job_id: String, status: JobStatus },

    /// A non-terminal job already owns this source path.
    #[error("Job {job_id} is already active for {}", path.display())]
    DuplicateActive { path: PathBuf, job_id: String },

    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub channel: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            channel: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for job storage backends.
pub trait JobStore: Send + Sync {
    /// Create a PENDING job. Fails with `DuplicateActive` if a non-terminal
    /// job exists for the same source path.
    fn create(&self, request: NewJob) -> Result<ScriptJob, JobError>;

    fn get(&self, id: &str) -> Result<Option<ScriptJob>, JobError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<ScriptJob>, JobError>;

    /// Count jobs matching the filter (pagination ignored).
    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Apply an update. Status changes must follow the state machine.
    fn update(&self, id: &str, update: JobUpdate) -> Result<ScriptJob, JobError>;

    /// The non-terminal job for a source path, if any.
    fn find_active_by_source(&self, path: &Path) -> Result<Option<ScriptJob>, JobError>;
}
