//! Pool of single-use overlay images.
//!
//! A pool is a plain directory. Acquiring picks the oldest matching file
//! without touching it; consuming moves it away, which is what removes it
//! from the pool. Nothing marks a file as reserved on disk: the execution
//! slot guarantees only one job is between acquire and consume.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::placer::{relocate_with_retry, Placer, Relocation, RetryPolicy};

use super::error::ResourceError;

/// An overlay picked for a job, still sitting in its pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayReservation {
    pub channel: String,
    pub path: PathBuf,
}

impl OverlayReservation {
    /// File extension of the overlay, `png` if it has none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "png".to_string())
    }
}

pub struct OverlayPool {
    placer: Arc<dyn Placer>,
    extensions: Vec<String>,
    retry: RetryPolicy,
    lock: Mutex<()>,
}

impl OverlayPool {
    pub fn new(placer: Arc<dyn Placer>, extensions: Vec<String>, retry: RetryPolicy) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            placer,
            extensions,
            retry,
            lock: Mutex::new(()),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| *x == e))
    }

    /// Matching files in `dir`, oldest first (ties broken by name).
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, ResourceError> {
        let unreadable = |e| ResourceError::PoolUnreadable {
            dir: dir.to_path_buf(),
            source: e,
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unreadable(e)),
        };

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let path = entry.path();
            if !self.accepts(&path) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }

        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Pick the oldest overlay in `dir` for `channel`.
    pub async fn acquire_next(
        &self,
        channel: &str,
        dir: &Path,
    ) -> Result<OverlayReservation, ResourceError> {
        let _lock = self.lock.lock().await;

        match self.list(dir).await?.into_iter().next() {
            Some(path) => {
                debug!("Reserved overlay {} for channel {}", path.display(), channel);
                Ok(OverlayReservation {
                    channel: channel.to_string(),
                    path,
                })
            }
            None => {
                warn!("Overlay pool for channel {} is empty", channel);
                metrics::OVERLAY_POOL_EMPTY
                    .with_label_values(&[channel])
                    .inc();
                Err(ResourceError::PoolEmpty {
                    channel: channel.to_string(),
                    dir: dir.to_path_buf(),
                })
            }
        }
    }

    /// Move a reserved overlay to `destination`, removing it from the pool.
    pub async fn consume(
        &self,
        reservation: &OverlayReservation,
        destination: &Path,
    ) -> Result<PathBuf, ResourceError> {
        let _lock = self.lock.lock().await;

        let relocation = Relocation::new(&reservation.path, destination);
        let placed = relocate_with_retry(self.placer.as_ref(), &relocation, self.retry).await?;
        info!(
            "Consumed overlay {} -> {}",
            reservation.path.display(),
            placed.destination.display()
        );
        Ok(placed.destination)
    }

    /// Give back a reservation that will not be consumed. The file never
    /// left the pool, so this only records the fact.
    pub fn release(&self, reservation: OverlayReservation) {
        debug!(
            "Released overlay {} for channel {}",
            reservation.path.display(),
            reservation.channel
        );
    }

    /// Number of overlays left in `dir`.
    pub async fn remaining(&self, dir: &Path) -> Result<usize, ResourceError> {
        let _lock = self.lock.lock().await;
        Ok(self.list(dir).await?.len())
    }
}
