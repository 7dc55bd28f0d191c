//! Mock voice client for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::voice::{VoiceClient, VoiceError, VoiceRequest};

/// Mock implementation of the VoiceClient trait.
///
/// Behaves like the real service on success: writes `final.wav` and
/// `final.srt` into `{session_root}/{session_name}/`.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockVoiceClient::new(temp.path().join("sessions"));
/// client.set_next_error(VoiceError::Timeout).await;
///
/// // ... run a job ...
///
/// assert_eq!(client.recorded_requests().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockVoiceClient {
    session_root: PathBuf,
    /// Recorded synthesize calls.
    requests: Arc<RwLock<Vec<VoiceRequest>>>,
    /// If set, the next call fails with this error.
    next_error: Arc<RwLock<Option<VoiceError>>>,
    write_subtitle: bool,
    /// Simulated synthesis time.
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockVoiceClient {
    pub fn new(session_root: impl Into<PathBuf>) -> Self {
        Self {
            session_root: session_root.into(),
            requests: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            write_subtitle: true,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Succeed without producing `final.srt`.
    pub fn without_subtitle(mut self) -> Self {
        self.write_subtitle = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get all recorded synthesize calls.
    pub async fn recorded_requests(&self) -> Vec<VoiceRequest> {
        self.requests.read().await.clone()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: VoiceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceClient for MockVoiceClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, request: &VoiceRequest) -> Result<(), VoiceError> {
        self.requests.write().await.push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let session = self.session_root.join(&request.session_name);
        let write = |name: &str, contents: &[u8]| {
            std::fs::create_dir_all(&session)
                .and_then(|_| std::fs::write(session.join(name), contents))
                .map_err(|e| VoiceError::ServiceError(e.to_string()))
        };
        write("final.wav", b"RIFF mock audio")?;
        if self.write_subtitle {
            write("final.srt", b"1\n00:00:00,000 --> 00:00:01,000\nmock\n")?;
        }
        Ok(())
    }
}
