//! Filesystem watcher for one channel directory.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::metrics;

use super::dispatcher::{DispatchOrigin, ScriptEvent};
use super::error::WatcherError;

/// True for regular-looking script files: matching extension, not a
/// quarantine leftover.
pub fn is_script(path: &Path, extension: &str) -> bool {
    let matches_ext = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false);
    let quarantined = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with("error_"))
        .unwrap_or(false);
    matches_ext && !quarantined
}

/// A file arrived: created in place or renamed into the directory.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Settings for one channel watcher.
#[derive(Debug, Clone)]
pub struct ChannelWatcherConfig {
    pub channel: String,
    pub dir: PathBuf,
    pub extension: String,
    pub settle_delay: Duration,
}

/// Watches one channel directory (non-recursive) and reports each new
/// script exactly once, after it has had time to settle.
pub struct ChannelWatcher {
    config: ChannelWatcherConfig,
    seen: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ChannelWatcher {
    pub fn new(config: ChannelWatcherConfig) -> Self {
        Self {
            config,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    /// Mark a path as already handled, e.g. by the startup scan.
    pub fn mark_seen(&self, path: &Path) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.insert(path.to_path_buf());
        }
    }

    /// Returns false if the path was already seen.
    fn first_sighting(seen: &Mutex<HashSet<PathBuf>>, path: &Path) -> bool {
        match seen.lock() {
            Ok(mut seen) => seen.insert(path.to_path_buf()),
            Err(_) => false,
        }
    }

    /// Start watching. Events go to `events` until `shutdown` fires.
    pub fn spawn(
        self,
        events: mpsc::Sender<ScriptEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, WatcherError> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<PathBuf>();

        let channel = self.config.channel.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) if is_arrival(&event.kind) => {
                    for path in event.paths {
                        if raw_tx.send(path).is_err() {
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => error!("Watch error on channel {}: {:?}", channel, e),
            },
            Config::default(),
        )
        .map_err(|e| WatcherError::Watch {
            path: self.config.dir.clone(),
            message: e.to_string(),
        })?;

        watcher
            .watch(&self.config.dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::Watch {
                path: self.config.dir.clone(),
                message: e.to_string(),
            })?;
        info!(
            "Watching channel {} at {}",
            self.config.channel,
            self.config.dir.display()
        );

        let handle = tokio::spawn(async move {
            // Dropping the watcher stops notifications.
            let _watcher = watcher;
            // Same delay for every entry, so deadlines stay in arrival order.
            let mut settling: VecDeque<(Instant, PathBuf)> = VecDeque::new();
            loop {
                let next_due = settling.front().map(|(due, _)| *due);
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Watcher for channel {} stopping", self.config.channel);
                        break;
                    }
                    raw = raw_rx.recv() => {
                        let Some(path) = raw else { break };
                        if self.on_arrival(&path) {
                            settling.push_back((Instant::now() + self.config.settle_delay, path));
                        }
                    }
                    _ = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                        if let Some((_, path)) = settling.pop_front() {
                            if !self.emit(path, &events).await {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(handle)
    }

    /// Returns true if the path is a new script that should settle.
    fn on_arrival(&self, path: &Path) -> bool {
        if path.is_dir() || !is_script(path, &self.config.extension) {
            return false;
        }
        if !Self::first_sighting(&self.seen, path) {
            debug!("Already seen {}", path.display());
            return false;
        }

        metrics::SCRIPTS_DETECTED
            .with_label_values(&[self.config.channel.as_str()])
            .inc();
        info!(
            channel = %self.config.channel,
            "New script detected: {}",
            path.display()
        );
        true
    }

    /// Hand a settled script on. Returns false once the receiver is gone.
    async fn emit(&self, path: PathBuf, events: &mpsc::Sender<ScriptEvent>) -> bool {
        if !path.is_file() {
            warn!("Script {} vanished before it settled", path.display());
            return true;
        }
        let event = ScriptEvent {
            channel: self.config.channel.clone(),
            path,
            origin: DispatchOrigin::Watcher,
        };
        if events.send(event).await.is_err() {
            debug!("Dispatcher gone, dropping event");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_script() {
        assert!(is_script(Path::new("/c/C1/story.txt"), "txt"));
        assert!(is_script(Path::new("/c/C1/STORY.TXT"), "txt"));
        assert!(!is_script(Path::new("/c/C1/story.md"), "txt"));
        assert!(!is_script(Path::new("/c/C1/story"), "txt"));
        assert!(!is_script(Path::new("/c/C1/error_story.txt"), "txt"));
    }

    #[test]
    fn test_arrival_kinds() {
        use notify::event::{CreateKind, DataChange};
        assert!(is_arrival(&EventKind::Create(CreateKind::File)));
        assert!(is_arrival(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(!is_arrival(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(!is_arrival(&EventKind::Modify(ModifyKind::Name(
            RenameMode::From
        ))));
    }

    #[test]
    fn test_mark_seen_blocks_later_sighting() {
        let watcher = ChannelWatcher::new(ChannelWatcherConfig {
            channel: "C1".to_string(),
            dir: PathBuf::from("/c/C1"),
            extension: "txt".to_string(),
            settle_delay: Duration::ZERO,
        });
        let path = Path::new("/c/C1/s.txt");
        watcher.mark_seen(path);
        assert!(!ChannelWatcher::first_sighting(&watcher.seen, path));
        assert!(ChannelWatcher::first_sighting(
            &watcher.seen,
            Path::new("/c/C1/t.txt")
        ));
    }

    #[tokio::test]
    async fn test_reports_new_script_once() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("C1");
        std::fs::create_dir_all(&dir).unwrap();

        let watcher = ChannelWatcher::new(ChannelWatcherConfig {
            channel: "C1".to_string(),
            dir: dir.clone(),
            extension: "txt".to_string(),
            settle_delay: Duration::from_millis(50),
        });
        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = watcher.spawn(tx, shutdown_rx).unwrap();

        std::fs::write(dir.join("notes.md"), "ignored").unwrap();
        std::fs::create_dir_all(dir.join("sub.txt")).unwrap();
        std::fs::write(dir.join("s.txt"), "script").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.channel, "C1");
        assert_eq!(event.path, dir.join("s.txt"));
        assert_eq!(event.origin, DispatchOrigin::Watcher);

        // Re-creating the same path is not a new script.
        std::fs::remove_file(dir.join("s.txt")).unwrap();
        std::fs::write(dir.join("s.txt"), "again").unwrap();
        let again = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(again.is_err());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scripts_reported_in_arrival_order() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("C1");
        std::fs::create_dir_all(&dir).unwrap();

        let watcher = ChannelWatcher::new(ChannelWatcherConfig {
            channel: "C1".to_string(),
            dir: dir.clone(),
            extension: "txt".to_string(),
            settle_delay: Duration::from_millis(100),
        });
        let (tx, mut rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = watcher.spawn(tx, shutdown_rx).unwrap();

        let names: Vec<String> = (0..40).map(|i| format!("s{:02}.txt", i)).collect();
        for name in &names {
            std::fs::write(dir.join(name), "script").unwrap();
        }

        let mut received = Vec::new();
        while received.len() < names.len() {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            received.push(event.path.file_name().unwrap().to_string_lossy().to_string());
        }
        assert_eq!(received, names);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
