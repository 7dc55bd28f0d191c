//! Moving finished scripts out of the watched directory.
//!
//! Failed scripts go to `error/` next to a plain-text `{file}.error.log`;
//! completed ones go to `processed/`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::job::{ErrorStage, ScriptJob};
use crate::layout::WorkspaceLayout;
use crate::placer::{Placer, PlacerError, Relocation};

/// Artifacts a failed job had produced before failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialArtifacts {
    pub audio_path: Option<PathBuf>,
    pub subtitle_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub overlay_path: Option<PathBuf>,
}

/// Everything written to an error log.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub job_id: String,
    pub channel: String,
    pub stage: ErrorStage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub artifacts: PartialArtifacts,
}

impl FailureReport {
    pub fn render(&self) -> String {
        let mut out = format!(
            "Error Stage: {}\nError Message: {}\nTimestamp: {}\nJob ID: {}\nChannel: {}\n",
            self.stage,
            self.message,
            self.timestamp.to_rfc3339(),
            self.job_id,
            self.channel,
        );
        let optional = [
            ("Audio Path", &self.artifacts.audio_path),
            ("SRT Path", &self.artifacts.subtitle_path),
            ("Video Path", &self.artifacts.video_path),
            ("Overlay Path", &self.artifacts.overlay_path),
        ];
        for (label, path) in optional {
            if let Some(path) = path {
                out.push_str(&format!("{}: {}\n", label, path.display()));
            }
        }
        out
    }
}

/// Where a quarantined script and its log ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct Quarantined {
    pub script_path: Option<PathBuf>,
    pub log_path: PathBuf,
}

pub fn error_log_path(error_dir: &Path, file_name: &str) -> PathBuf {
    error_dir.join(format!("{}.error.log", file_name))
}

/// Move the script into `error/` and write its log. A script that is
/// already gone still gets a log.
pub async fn quarantine(
    placer: &dyn Placer,
    layout: &WorkspaceLayout,
    job: &ScriptJob,
    report: &FailureReport,
) -> Result<Quarantined, PlacerError> {
    let error_dir = layout.error_dir(&job.channel);
    tokio::fs::create_dir_all(&error_dir)
        .await
        .map_err(|source| PlacerError::DirectoryCreationFailed {
            path: error_dir.clone(),
            source,
        })?;

    let script_path = if job.source_path.exists() {
        let placed = placer
            .relocate(&Relocation::into_dir(&job.source_path, &error_dir))
            .await?;
        Some(placed.destination)
    } else {
        warn!(
            job_id = %job.id,
            "Script {} no longer exists, writing log only",
            job.source_path.display()
        );
        None
    };

    let log_path = error_log_path(&error_dir, &job.file_name);
    tokio::fs::write(&log_path, report.render()).await?;

    info!(
        job_id = %job.id,
        channel = %job.channel,
        stage = %report.stage,
        "Quarantined {} with log {}",
        job.file_name,
        log_path.display()
    );

    Ok(Quarantined {
        script_path,
        log_path,
    })
}

/// Move a completed script into `processed/`.
pub async fn promote(
    placer: &dyn Placer,
    layout: &WorkspaceLayout,
    job: &ScriptJob,
) -> Result<PathBuf, PlacerError> {
    let processed_dir = layout.processed_dir(&job.channel);
    let placed = placer
        .relocate(&Relocation::into_dir(&job.source_path, &processed_dir))
        .await?;
    info!(
        job_id = %job.id,
        channel = %job.channel,
        "Moved {} to {}",
        job.file_name,
        placed.destination.display()
    );
    Ok(placed.destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobStatus, NewJob, SqliteJobStore, JobStore};
    use crate::placer::FsPlacer;
    use tempfile::TempDir;

    fn job_for(root: &Path) -> ScriptJob {
        let dir = root.join("scripts/C1");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("s.txt");
        std::fs::write(&path, "script").unwrap();
        let store = SqliteJobStore::in_memory().unwrap();
        store.create(NewJob::new(path, "C1")).unwrap()
    }

    fn report(stage: ErrorStage, artifacts: PartialArtifacts) -> FailureReport {
        FailureReport {
            job_id: "job-1".to_string(),
            channel: "C1".to_string(),
            stage,
            message: "Voice artifact missing: /s/final.srt".to_string(),
            timestamp: Utc::now(),
            artifacts,
        }
    }

    #[test]
    fn test_report_lists_only_known_artifacts() {
        let text = report(
            ErrorStage::Video,
            PartialArtifacts {
                audio_path: Some(PathBuf::from("/a/s.wav")),
                subtitle_path: Some(PathBuf::from("/a/s.srt")),
                ..Default::default()
            },
        )
        .render();

        assert!(text.starts_with("Error Stage: video\n"));
        assert!(text.contains("Error Message: Voice artifact missing"));
        assert!(text.contains("Audio Path: /a/s.wav"));
        assert!(text.contains("SRT Path: /a/s.srt"));
        assert!(!text.contains("Video Path"));
        assert!(!text.contains("Overlay Path"));
    }

    #[tokio::test]
    async fn test_quarantine_moves_script_and_writes_log() {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path());
        let job = job_for(temp.path());
        assert_eq!(job.status, JobStatus::Pending);

        let result = quarantine(
            &FsPlacer::with_defaults(),
            &layout,
            &job,
            &report(ErrorStage::Voice, PartialArtifacts::default()),
        )
        .await
        .unwrap();

        let error_dir = temp.path().join("scripts/C1/error");
        assert_eq!(result.script_path, Some(error_dir.join("s.txt")));
        assert_eq!(result.log_path, error_dir.join("s.txt.error.log"));
        assert!(!job.source_path.exists());
        let log = std::fs::read_to_string(&result.log_path).unwrap();
        assert!(log.contains("final.srt"));
    }

    #[tokio::test]
    async fn test_quarantine_without_script() {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path());
        let job = job_for(temp.path());
        std::fs::remove_file(&job.source_path).unwrap();

        let result = quarantine(
            &FsPlacer::with_defaults(),
            &layout,
            &job,
            &report(ErrorStage::Unexpected, PartialArtifacts::default()),
        )
        .await
        .unwrap();

        assert!(result.script_path.is_none());
        assert!(result.log_path.exists());
    }

    #[tokio::test]
    async fn test_promote_moves_to_processed() {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path());
        let job = job_for(temp.path());

        let dest = promote(&FsPlacer::with_defaults(), &layout, &job)
            .await
            .unwrap();
        assert_eq!(dest, temp.path().join("scripts/C1/processed/s.txt"));
        assert!(dest.exists());
        assert!(!job.source_path.exists());
    }
}
