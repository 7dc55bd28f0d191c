//! File system placer implementation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

use super::config::PlacerConfig;
use super::error::PlacerError;
use super::traits::Placer;
use super::types::{PlacedFile, PlacementMethod, Relocation};

/// File system based placer implementation.
pub struct FsPlacer {
    config: PlacerConfig,
}

impl FsPlacer {
    /// Creates a new file system placer with the given configuration.
    pub fn new(config: PlacerConfig) -> Self {
        Self { config }
    }

    /// Creates a placer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PlacerConfig::default())
    }

    /// Attempts to move a file atomically (rename).
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // EXDEV (18 on Linux): source and destination are on different filesystems
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Copies a file, hashing the bytes as they are written.
    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<(u64, String), PlacerError> {
        let copy_failed =
            |e| PlacerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e);

        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlacerError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                PlacerError::Io(e)
            }
        })?;
        let dest_file = File::create(destination).await.map_err(copy_failed)?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(copy_failed)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            writer
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(copy_failed)?;
            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(copy_failed)?;

        Ok((total_bytes, format!("{:x}", hasher.finalize())))
    }

    /// SHA-256 of a file on disk.
    async fn checksum(&self, path: &Path) -> Result<String, PlacerError> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut hasher = Sha256::new();
        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Copy, verify, then remove the source.
    async fn copy_and_remove(&self, relocation: &Relocation) -> Result<PlacedFile, PlacerError> {
        let (size_bytes, checksum) = self
            .copy_file(&relocation.source, &relocation.destination)
            .await?;

        if self.config.verify_checksums {
            let actual = self.checksum(&relocation.destination).await?;
            if actual != checksum {
                let _ = fs::remove_file(&relocation.destination).await;
                return Err(PlacerError::ChecksumMismatch {
                    path: relocation.destination.clone(),
                    expected: checksum,
                    actual,
                });
            }
        }

        fs::remove_file(&relocation.source)
            .await
            .map_err(|e| PlacerError::CleanupFailed {
                path: relocation.source.clone(),
                source: e,
            })?;

        Ok(PlacedFile {
            destination: relocation.destination.clone(),
            size_bytes,
            method: PlacementMethod::Copy,
            checksum: Some(checksum),
        })
    }
}

#[async_trait]
impl Placer for FsPlacer {
    fn name(&self) -> &str {
        "fs"
    }

    async fn relocate(&self, relocation: &Relocation) -> Result<PlacedFile, PlacerError> {
        if !relocation.source.exists() {
            return Err(PlacerError::SourceNotFound {
                path: relocation.source.clone(),
            });
        }

        if relocation.destination.exists() && !relocation.overwrite {
            return Err(PlacerError::DestinationExists {
                path: relocation.destination.clone(),
            });
        }

        if let Some(parent) = relocation.destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PlacerError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        if self.config.prefer_atomic_moves {
            let moved = Self::try_atomic_move(&relocation.source, &relocation.destination)
                .await
                .map_err(|e| {
                    PlacerError::move_failed(
                        relocation.source.clone(),
                        relocation.destination.clone(),
                        e,
                    )
                })?;
            if moved {
                let meta = fs::metadata(&relocation.destination).await?;
                debug!(
                    "Renamed {} -> {}",
                    relocation.source.display(),
                    relocation.destination.display()
                );
                return Ok(PlacedFile {
                    destination: relocation.destination.clone(),
                    size_bytes: meta.len(),
                    method: PlacementMethod::Rename,
                    checksum: None,
                });
            }
            debug!(
                "Rename crosses filesystems, copying {} -> {}",
                relocation.source.display(),
                relocation.destination.display()
            );
        }

        self.copy_and_remove(relocation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_rename_into_new_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("s.txt");
        std::fs::write(&source, "hello").unwrap();
        let destination = temp.path().join("processed/nested/s.txt");

        let placed = FsPlacer::with_defaults()
            .relocate(&Relocation::new(&source, &destination))
            .await
            .unwrap();

        assert_eq!(placed.method, PlacementMethod::Rename);
        assert_eq!(placed.size_bytes, 5);
        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_copy_path_verifies_and_removes_source() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.wav");
        std::fs::write(&source, vec![7u8; 10_000]).unwrap();
        let destination = temp.path().join("out/a.wav");

        let placer = FsPlacer::new(
            PlacerConfig::default()
                .with_atomic_moves(false)
                .with_buffer_size(1024),
        );
        let placed = placer
            .relocate(&Relocation::new(&source, &destination))
            .await
            .unwrap();

        assert_eq!(placed.method, PlacementMethod::Copy);
        assert_eq!(placed.size_bytes, 10_000);
        assert_eq!(placed.checksum.as_deref().map(str::len), Some(64));
        assert!(!source.exists());
        assert_eq!(std::fs::read(&destination).unwrap().len(), 10_000);
    }

    #[tokio::test]
    async fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = FsPlacer::with_defaults()
            .relocate(&Relocation::new(
                temp.path().join("nope"),
                temp.path().join("dest"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PlacerError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_existing_destination_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a");
        let destination = temp.path().join("b");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&destination, "old").unwrap();

        let err = FsPlacer::with_defaults()
            .relocate(&Relocation::new(&source, &destination).without_overwrite())
            .await
            .unwrap_err();
        assert!(matches!(err, PlacerError::DestinationExists { .. }));
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_destination() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a");
        let destination = temp.path().join("b");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&destination, "old").unwrap();

        FsPlacer::with_defaults()
            .relocate(&Relocation::new(&source, &destination))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "new");
    }
}
