//! Ingestion errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobError;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Failed to watch {}: {message}", path.display())]
    Watch { path: PathBuf, message: String },

    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Job(#[from] JobError),

    /// Workers are gone; nothing will run the job.
    #[error("Job queue is closed")]
    QueueClosed,
}
