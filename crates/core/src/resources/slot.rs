//! The global execution slot.
//!
//! One permit, held by a job for its whole run. Waiters are served in
//! arrival order (tokio's semaphore is fair).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::metrics;

use super::error::ResourceError;

#[derive(Debug, Clone)]
struct Holder {
    job_id: String,
    since: DateTime<Utc>,
}

#[derive(Default)]
struct SlotStats {
    waiting: AtomicU64,
    total_acquired: AtomicU64,
}

/// Snapshot of the slot for status reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotStatus {
    /// Job currently holding the slot.
    pub held_by: Option<String>,
    pub held_since: Option<DateTime<Utc>>,
    /// Jobs blocked in `acquire`.
    pub waiting: u64,
    pub total_acquired: u64,
}

/// Single binary permit shared by all workers.
#[derive(Clone)]
pub struct ExecutionSlot {
    semaphore: Arc<Semaphore>,
    holder: Arc<Mutex<Option<Holder>>>,
    stats: Arc<SlotStats>,
}

impl Default for ExecutionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            holder: Arc::new(Mutex::new(None)),
            stats: Arc::new(SlotStats::default()),
        }
    }

    /// Wait for the slot. The returned guard releases it when dropped.
    pub async fn acquire(&self, job_id: &str) -> Result<SlotGuard, ResourceError> {
        let started = Instant::now();
        self.stats.waiting.fetch_add(1, Ordering::Relaxed);
        let permit = Arc::clone(&self.semaphore).acquire_owned().await;
        self.stats.waiting.fetch_sub(1, Ordering::Relaxed);
        let permit = permit.map_err(|_| ResourceError::SlotClosed)?;

        metrics::SLOT_WAIT_DURATION.observe(started.elapsed().as_secs_f64());
        Ok(self.hand_out(permit, job_id))
    }

    /// Take the slot only if it is free right now.
    pub fn try_acquire(&self, job_id: &str) -> Option<SlotGuard> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        Some(self.hand_out(permit, job_id))
    }

    fn hand_out(&self, permit: OwnedSemaphorePermit, job_id: &str) -> SlotGuard {
        if let Ok(mut holder) = self.holder.lock() {
            *holder = Some(Holder {
                job_id: job_id.to_string(),
                since: Utc::now(),
            });
        }
        self.stats.total_acquired.fetch_add(1, Ordering::Relaxed);
        debug!("Job {} acquired the execution slot", job_id);

        SlotGuard {
            _permit: permit,
            holder: Arc::clone(&self.holder),
            job_id: job_id.to_string(),
        }
    }

    /// Job currently holding the slot, if any.
    pub fn holder(&self) -> Option<String> {
        self.holder
            .lock()
            .ok()
            .and_then(|h| h.as_ref().map(|h| h.job_id.clone()))
    }

    pub fn is_free(&self) -> bool {
        self.semaphore.available_permits() > 0
    }

    pub fn status(&self) -> SlotStatus {
        let holder = self.holder.lock().ok().and_then(|h| h.clone());
        SlotStatus {
            held_by: holder.as_ref().map(|h| h.job_id.clone()),
            held_since: holder.map(|h| h.since),
            waiting: self.stats.waiting.load(Ordering::Relaxed),
            total_acquired: self.stats.total_acquired.load(Ordering::Relaxed),
        }
    }

    /// Refuse all future acquisitions; current waiters get `SlotClosed`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Proof of holding the execution slot.
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    holder: Arc<Mutex<Option<Holder>>>,
    job_id: String,
}

impl SlotGuard {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // The permit is returned after this body runs, so the holder is
        // cleared before the next job can record itself.
        if let Ok(mut holder) = self.holder.lock() {
            if holder.as_ref().is_some_and(|h| h.job_id == self.job_id) {
                *holder = None;
            }
        }
        debug!("Job {} released the execution slot", self.job_id);
    }
}
