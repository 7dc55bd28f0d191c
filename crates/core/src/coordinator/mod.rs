//! Pipeline coordinator.
//!
//! Owns the long-running side of the system: per-channel watchers, the
//! dispatch loop and the worker pool that hands jobs to the
//! [`PipelineController`](crate::pipeline::PipelineController).

mod config;
mod runner;
mod types;

pub use config::CoordinatorSettings;
pub use runner::Coordinator;
pub use types::{CoordinatorError, CoordinatorStatus};
