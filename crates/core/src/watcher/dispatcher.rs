//! Turns detected scripts into queued jobs.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::job::{JobError, JobStore, NewJob, ScriptJob};
use crate::metrics;

use super::error::DispatchError;

/// How a script reached the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOrigin {
    Watcher,
    StartupScan,
    Resubmit,
}

impl DispatchOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOrigin::Watcher => "watcher",
            DispatchOrigin::StartupScan => "startup_scan",
            DispatchOrigin::Resubmit => "resubmit",
        }
    }
}

/// A script ready to become a job.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEvent {
    pub channel: String,
    pub path: PathBuf,
    pub origin: DispatchOrigin,
}

/// Creates PENDING jobs and hands their ids to the workers.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    queue: mpsc::Sender<String>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn JobStore>, queue: mpsc::Sender<String>) -> Self {
        Self { store, queue }
    }

    /// Create and enqueue a job for the script. Returns `None` if a job for
    /// the same path is still active.
    pub async fn dispatch(&self, event: ScriptEvent) -> Result<Option<ScriptJob>, DispatchError> {
        if let Some(active) = self.store.find_active_by_source(&event.path)? {
            self.skip(&event, &active.id);
            return Ok(None);
        }

        let job = match self
            .store
            .create(NewJob::new(event.path.clone(), event.channel.clone()))
        {
            Ok(job) => job,
            Err(JobError::DuplicateActive { job_id, .. }) => {
                self.skip(&event, &job_id);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        self.queue
            .send(job.id.clone())
            .await
            .map_err(|_| DispatchError::QueueClosed)?;

        metrics::JOBS_DISPATCHED
            .with_label_values(&[event.origin.as_str()])
            .inc();
        info!(
            job_id = %job.id,
            channel = %job.channel,
            origin = event.origin.as_str(),
            "Queued {}",
            job.file_name
        );
        Ok(Some(job))
    }

    fn skip(&self, event: &ScriptEvent, active_job: &str) {
        metrics::DUPLICATES_SKIPPED
            .with_label_values(&[event.channel.as_str()])
            .inc();
        debug!(
            "Skipping {}: job {} is still active",
            event.path.display(),
            active_job
        );
    }
}
