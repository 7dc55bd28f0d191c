//! Filesystem layout of a production workspace.
//!
//! ```text
//! {root}/scripts/{channel}/                 intake (watched)
//! {root}/scripts/{channel}/{error,processed,completed}/
//! {root}/assets/{audio,srt,videos}/
//! {root}/assets/{overlay1,overlay2,final,voice}/{channel}/
//! {root}/config/channels/{channel}.json
//! ```

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;
use tracing::{debug, info};

static CHANNEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,63}$").unwrap());

/// Errors raised while preparing the workspace.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    #[error("failed to prepare {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Check that a channel name is safe to use as a single path component.
pub fn validate_channel_name(name: &str) -> Result<(), LayoutError> {
    if CHANNEL_NAME.is_match(name) && !name.contains("..") {
        Ok(())
    } else {
        Err(LayoutError::InvalidChannel(name.to_string()))
    }
}

/// Path helpers rooted at the workspace directory.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path that may be relative to the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.scripts_dir().join(channel)
    }

    pub fn error_dir(&self, channel: &str) -> PathBuf {
        self.channel_dir(channel).join("error")
    }

    pub fn processed_dir(&self, channel: &str) -> PathBuf {
        self.channel_dir(channel).join("processed")
    }

    pub fn completed_dir(&self, channel: &str) -> PathBuf {
        self.channel_dir(channel).join("completed")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.assets_dir().join("audio")
    }

    pub fn srt_dir(&self) -> PathBuf {
        self.assets_dir().join("srt")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.assets_dir().join("videos")
    }

    pub fn overlay1_dir(&self, channel: &str) -> PathBuf {
        self.assets_dir().join("overlay1").join(channel)
    }

    pub fn overlay2_dir(&self, channel: &str) -> PathBuf {
        self.assets_dir().join("overlay2").join(channel)
    }

    pub fn final_dir(&self, channel: &str) -> PathBuf {
        self.assets_dir().join("final").join(channel)
    }

    pub fn voice_dir(&self, channel: &str) -> PathBuf {
        self.assets_dir().join("voice").join(channel)
    }

    pub fn channel_configs_dir(&self) -> PathBuf {
        self.root.join("config").join("channels")
    }

    pub fn channel_config_path(&self, channel: &str) -> PathBuf {
        self.channel_configs_dir().join(format!("{}.json", channel))
    }

    /// Create the channel-independent part of the tree.
    pub async fn ensure_base_directories(&self) -> Result<(), LayoutError> {
        let dirs = [
            self.scripts_dir(),
            self.audio_dir(),
            self.srt_dir(),
            self.videos_dir(),
            self.channel_configs_dir(),
        ];
        for dir in dirs {
            create_dir(&dir).await?;
        }
        Ok(())
    }

    /// Create every directory a channel needs.
    pub async fn ensure_channel_directories(&self, channel: &str) -> Result<(), LayoutError> {
        validate_channel_name(channel)?;

        let dirs = [
            self.channel_dir(channel),
            self.error_dir(channel),
            self.processed_dir(channel),
            self.completed_dir(channel),
            self.overlay1_dir(channel),
            self.overlay2_dir(channel),
            self.final_dir(channel),
            self.voice_dir(channel),
        ];
        for dir in dirs {
            create_dir(&dir).await?;
        }
        debug!("Prepared directories for channel {}", channel);
        Ok(())
    }

    /// List channel directories under `scripts/`, sorted by name.
    /// Entries that are not valid channel names are skipped.
    pub async fn discover_channels(&self) -> Result<Vec<String>, LayoutError> {
        let scripts = self.scripts_dir();
        let mut entries = match tokio::fs::read_dir(&scripts).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LayoutError::Io {
                    path: scripts,
                    source: e,
                })
            }
        };

        let mut channels = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(LayoutError::Io {
                        path: scripts,
                        source: e,
                    })
                }
            };
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && validate_channel_name(&name).is_ok() {
                channels.push(name);
            }
        }
        channels.sort();
        Ok(channels)
    }

    /// Discover channels, creating `default_channel` when none exist yet.
    pub async fn discover_or_create_channels(
        &self,
        default_channel: &str,
    ) -> Result<Vec<String>, LayoutError> {
        let mut channels = self.discover_channels().await?;
        if channels.is_empty() {
            info!("No channels found, creating default channel {}", default_channel);
            self.ensure_channel_directories(default_channel).await?;
            channels.push(default_channel.to_string());
        }
        Ok(channels)
    }
}

async fn create_dir(path: &Path) -> Result<(), LayoutError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| LayoutError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}
