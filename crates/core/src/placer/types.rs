//! Types for the placer module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A request to move one file to a new location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// File to move.
    pub source: PathBuf,
    /// Final path, including the file name.
    pub destination: PathBuf,
    /// Replace an existing destination instead of failing.
    pub overwrite: bool,
}

impl Relocation {
    /// Move `source` to `destination`, replacing whatever is there.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            overwrite: true,
        }
    }

    /// Move `source` into `dir`, keeping its file name.
    pub fn into_dir(source: impl Into<PathBuf>, dir: &Path) -> Self {
        let source = source.into();
        let destination = match source.file_name() {
            Some(name) => dir.join(name),
            None => dir.to_path_buf(),
        };
        Self::new(source, destination)
    }

    /// Fail instead of replacing an existing destination.
    pub fn without_overwrite(mut self) -> Self {
        self.overwrite = false;
        self
    }
}

/// How a relocation was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMethod {
    /// Same-filesystem rename.
    Rename,
    /// Copy followed by removal of the source.
    Copy,
}

/// Information about a placed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedFile {
    /// Final destination path.
    pub destination: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    pub method: PlacementMethod,
    /// SHA-256 of the copied bytes, when the copy path verified them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}
