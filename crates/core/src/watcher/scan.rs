//! Startup scan of a channel directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::channel_watcher::is_script;
use super::error::WatcherError;

/// Scripts already sitting in `dir`, oldest first (ties by name).
pub async fn scan_existing(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, WatcherError> {
    let io_err = |source| WatcherError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(e)),
    };

    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if !metadata.is_file() || !is_script(&path, extension) {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((modified, path));
    }

    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}
