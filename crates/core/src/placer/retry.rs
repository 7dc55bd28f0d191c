//! Bounded retry around a single relocation.

use std::time::Duration;

use tracing::warn;

use super::error::PlacerError;
use super::traits::Placer;
use super::types::{PlacedFile, Relocation};

/// How many times to try a relocation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, no waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(3))
    }
}

/// Relocate with retries. Non-retryable errors are returned immediately.
pub async fn relocate_with_retry(
    placer: &dyn Placer,
    relocation: &Relocation,
    policy: RetryPolicy,
) -> Result<PlacedFile, PlacerError> {
    let mut attempt = 1;
    loop {
        match placer.relocate(relocation).await {
            Ok(placed) => return Ok(placed),
            Err(e) if e.is_retryable() && attempt < policy.attempts => {
                warn!(
                    "Relocation {} -> {} failed (attempt {}/{}): {}",
                    relocation.source.display(),
                    relocation.destination.display(),
                    attempt,
                    policy.attempts,
                    e
                );
                attempt += 1;
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
