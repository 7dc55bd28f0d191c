//! Pipeline controller: the per-job state machine.
//!
//! A run holds the execution slot from before VOICE_IN_PROGRESS until the
//! job is terminal. Whatever goes wrong inside a run ends the job in ERROR
//! with its script quarantined; successful runs promote the script to
//! `processed/`.

mod controller;
mod error;
mod quarantine;

pub use controller::{PipelineController, PipelineCounters};
pub use error::{PipelineError, StageError};
pub use quarantine::{error_log_path, promote, quarantine, FailureReport, PartialArtifacts, Quarantined};
