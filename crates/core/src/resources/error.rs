//! Error types for shared resource access.

use std::path::PathBuf;
use thiserror::Error;

use crate::channel::ChannelConfigError;
use crate::placer::PlacerError;

/// Errors raised while acquiring or consuming shared resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The execution slot was closed during shutdown.
    #[error("execution slot is closed")]
    SlotClosed,

    /// The overlay pool of a channel has nothing left.
    #[error("no overlay available for channel {channel} in {}", dir.display())]
    PoolEmpty { channel: String, dir: PathBuf },

    #[error("failed to read overlay pool {}", dir.display())]
    PoolUnreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Channel has no configuration and the default is not allowed.
    #[error("no configuration found for channel {0}")]
    ConfigMissing(String),

    #[error(transparent)]
    Config(#[from] ChannelConfigError),

    /// Inputs the next stage needs are not on disk.
    #[error("Files not found: {}", join_paths(.0))]
    MissingFiles(Vec<PathBuf>),

    /// Moving a consumed resource failed.
    #[error("failed to consume resource: {0}")]
    Placement(#[from] PlacerError),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
