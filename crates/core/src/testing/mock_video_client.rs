//! Mock video client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::video::{RenderRequest, RenderStatus, VideoClient, VideoError};

/// Mock implementation of the VideoClient trait.
///
/// Provides controllable behavior for testing:
/// - Writes `{output_dir}/{output_name}` on submit, like the real service
/// - Plays back a scripted sequence of status answers
/// - Simulates submit failures
///
/// Once the scripted statuses run out every check reports success, or
/// keeps reporting pending with [`never_completes`](Self::never_completes).
#[derive(Debug)]
pub struct MockVideoClient {
    output_dir: PathBuf,
    /// Recorded submissions.
    requests: Arc<RwLock<Vec<RenderRequest>>>,
    statuses: Arc<RwLock<VecDeque<RenderStatus>>>,
    /// If set, the next submit fails with this error.
    next_submit_error: Arc<RwLock<Option<VideoError>>>,
    status_checks: AtomicU32,
    task_counter: AtomicU32,
    write_output: bool,
    never_completes: bool,
}

impl MockVideoClient {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            requests: Arc::new(RwLock::new(Vec::new())),
            statuses: Arc::new(RwLock::new(VecDeque::new())),
            next_submit_error: Arc::new(RwLock::new(None)),
            status_checks: AtomicU32::new(0),
            task_counter: AtomicU32::new(0),
            write_output: true,
            never_completes: false,
        }
    }

    /// Report success without writing a video file.
    pub fn without_output(mut self) -> Self {
        self.write_output = false;
        self
    }

    /// Report pending forever once scripted statuses are used up.
    pub fn never_completes(mut self) -> Self {
        self.never_completes = true;
        self
    }

    /// Answers for the next status checks, in order.
    pub async fn set_statuses(&self, statuses: Vec<RenderStatus>) {
        *self.statuses.write().await = statuses.into();
    }

    pub async fn set_next_submit_error(&self, error: VideoError) {
        *self.next_submit_error.write().await = Some(error);
    }

    /// Get all recorded submissions.
    pub async fn recorded_requests(&self) -> Vec<RenderRequest> {
        self.requests.read().await.clone()
    }

    /// Number of status checks made so far.
    pub async fn status_checks(&self) -> u32 {
        self.status_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoClient for MockVideoClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: &RenderRequest) -> Result<String, VideoError> {
        if let Some(error) = self.next_submit_error.write().await.take() {
            return Err(error);
        }
        self.requests.write().await.push(request.clone());

        if self.write_output {
            std::fs::create_dir_all(&self.output_dir)
                .and_then(|_| {
                    std::fs::write(self.output_dir.join(&request.output_name), b"mock video")
                })
                .map_err(|e| VideoError::ServiceError(e.to_string()))?;
        }

        let n = self.task_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{}", n))
    }

    async fn status(&self, _task_id: &str) -> Result<RenderStatus, VideoError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = self.statuses.write().await.pop_front() {
            return Ok(status);
        }
        if self.never_completes {
            Ok(RenderStatus::Pending {
                status: Some("processing".to_string()),
            })
        } else {
            Ok(RenderStatus::Succeeded { output_path: None })
        }
    }
}
