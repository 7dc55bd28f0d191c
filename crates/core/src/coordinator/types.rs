//! Types for the coordinator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PipelineCounters;
use crate::resources::SlotStatus;

/// Errors that can occur while running the coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Operation needs a started coordinator.
    #[error("coordinator is not running")]
    NotRunning,

    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// Not a bare file name.
    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    /// Nothing under `error/` with that name.
    #[error("script not quarantined: {channel}/{file_name}")]
    NotQuarantined { channel: String, file_name: String },

    /// A job for the script is still active.
    #[error("script already active: {channel}/{file_name}")]
    AlreadyActive { channel: String, file_name: String },

    #[error("layout error: {0}")]
    Layout(#[from] crate::layout::LayoutError),

    #[error("job store error: {0}")]
    Job(#[from] crate::job::JobError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] crate::watcher::DispatchError),

    #[error("watcher error: {0}")]
    Watcher(#[from] crate::watcher::WatcherError),

    #[error("placement error: {0}")]
    Placement(#[from] crate::placer::PlacerError),
}

/// Current status of the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub running: bool,
    /// Channels being watched.
    pub channels: Vec<String>,
    pub workers: usize,
    pub slot: SlotStatus,
    /// Runs since startup.
    pub active_runs: u64,
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub pending_count: usize,
    pub voice_in_progress_count: usize,
    pub voice_done_count: usize,
    pub video_in_progress_count: usize,
    pub completed_count: usize,
    pub error_count: usize,
}

impl CoordinatorStatus {
    pub(crate) fn with_counters(mut self, counters: PipelineCounters) -> Self {
        self.active_runs = counters.active;
        self.completed_runs = counters.completed;
        self.failed_runs = counters.failed;
        self
    }
}
