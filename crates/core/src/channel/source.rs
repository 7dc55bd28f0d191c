//! Backing stores for channel configuration.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::layout::{validate_channel_name, WorkspaceLayout};

use super::types::ChannelConfig;

/// Errors produced while loading channel configuration.
#[derive(Debug, Error)]
pub enum ChannelConfigError {
    /// No configuration exists for the channel.
    #[error("no configuration found for channel {0}")]
    NotFound(String),

    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    #[error("failed to parse configuration for channel {channel}: {message}")]
    Parse { channel: String, message: String },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChannelConfigError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Somewhere channel configuration can be read from.
#[async_trait]
pub trait ChannelConfigSource: Send + Sync {
    /// Read the configuration of `channel` from the backing store.
    async fn load(&self, channel: &str) -> Result<ChannelConfig, ChannelConfigError>;
}

/// Reads `config/channels/{channel}.json` under the workspace root.
pub struct JsonFileSource {
    layout: WorkspaceLayout,
}

impl JsonFileSource {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl ChannelConfigSource for JsonFileSource {
    async fn load(&self, channel: &str) -> Result<ChannelConfig, ChannelConfigError> {
        validate_channel_name(channel)
            .map_err(|_| ChannelConfigError::InvalidChannel(channel.to_string()))?;

        let path = self.layout.channel_config_path(channel);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChannelConfigError::NotFound(channel.to_string()));
            }
            Err(e) => return Err(ChannelConfigError::Io { path, source: e }),
        };

        debug!("Read channel config from {}", path.display());

        serde_json::from_str(&raw).map_err(|e| ChannelConfigError::Parse {
            channel: channel.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_json_file() {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path());
        std::fs::create_dir_all(layout.channel_configs_dir()).unwrap();
        std::fs::write(
            layout.channel_config_path("C1"),
            r#"{"video_settings": {"preset_name": "7"}}"#,
        )
        .unwrap();

        let source = JsonFileSource::new(layout);
        let config = source.load("C1").await.unwrap();
        assert_eq!(config.video_settings.preset_name, "7");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let source = JsonFileSource::new(WorkspaceLayout::new(temp.path()));

        let err = source.load("C9").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path());
        std::fs::create_dir_all(layout.channel_configs_dir()).unwrap();
        std::fs::write(layout.channel_config_path("C1"), "{not json").unwrap();

        let source = JsonFileSource::new(layout);
        let err = source.load("C1").await.unwrap_err();
        assert!(matches!(err, ChannelConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_rejects_path_like_channel() {
        let temp = TempDir::new().unwrap();
        let source = JsonFileSource::new(WorkspaceLayout::new(temp.path()));

        let err = source.load("../secrets").await.unwrap_err();
        assert!(matches!(err, ChannelConfigError::InvalidChannel(_)));
    }
}
