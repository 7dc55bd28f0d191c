//! Job record and status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a job is in the pipeline.
///
/// ```text
/// PENDING -> VOICE_IN_PROGRESS -> VOICE_DONE -> VIDEO_IN_PROGRESS -> COMPLETED
///    \              \                 \                \
///     +--------------+-----------------+----------------+--> ERROR
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    VoiceInProgress,
    VoiceDone,
    VideoInProgress,
    Completed,
    Error,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::VoiceInProgress,
        JobStatus::VoiceDone,
        JobStatus::VideoInProgress,
        JobStatus::Completed,
        JobStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::VoiceInProgress => "VOICE_IN_PROGRESS",
            JobStatus::VoiceDone => "VOICE_DONE",
            JobStatus::VideoInProgress => "VIDEO_IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Error => "ERROR",
        }
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// The one forward edge out of this status, if any.
    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Pending => Some(JobStatus::VoiceInProgress),
            JobStatus::VoiceInProgress => Some(JobStatus::VoiceDone),
            JobStatus::VoiceDone => Some(JobStatus::VideoInProgress),
            JobStatus::VideoInProgress => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Error => None,
        }
    }

    /// Legal edges: one step forward, or to ERROR from any non-terminal status.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == JobStatus::Error || self.next() == Some(to)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

/// Which part of the pipeline an ERROR came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Voice,
    Video,
    /// Missing configuration, empty overlay pool or missing inputs.
    Resource,
    Unexpected,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::Voice => "voice",
            ErrorStage::Video => "video",
            ErrorStage::Resource => "resource",
            ErrorStage::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "voice" => Ok(ErrorStage::Voice),
            "video" => Ok(ErrorStage::Video),
            "resource" => Ok(ErrorStage::Resource),
            "unexpected" => Ok(ErrorStage::Unexpected),
            other => Err(format!("unknown error stage: {}", other)),
        }
    }
}

/// One script's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptJob {
    pub id: String,
    /// Path of the script when it was detected.
    pub source_path: PathBuf,
    pub file_name: String,
    pub channel: String,
    pub status: JobStatus,
    pub error_stage: Option<ErrorStage>,
    pub error_message: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub subtitle_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    /// Voice session name.
    pub voice_task_id: Option<String>,
    /// Render task id returned by the video service.
    pub video_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScriptJob {
    /// File name without its extension.
    pub fn stem(&self) -> String {
        std::path::Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_name.clone())
    }
}

/// Request to create a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source_path: PathBuf,
    pub channel: String,
}

impl NewJob {
    pub fn new(source_path: impl Into<PathBuf>, channel: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            channel: channel.into(),
        }
    }
}

/// A status change and/or fields to record. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub error_stage: Option<ErrorStage>,
    pub error_message: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub subtitle_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub voice_task_id: Option<String>,
    pub video_task_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Transition to ERROR with the failing stage and message.
    pub fn error(stage: ErrorStage, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error_stage: Some(stage),
            error_message: Some(message.into()),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn with_audio(mut self, audio: PathBuf, subtitle: PathBuf) -> Self {
        self.audio_path = Some(audio);
        self.subtitle_path = Some(subtitle);
        self
    }

    pub fn with_video_path(mut self, path: PathBuf) -> Self {
        self.video_path = Some(path);
        self
    }

    pub fn with_voice_task_id(mut self, id: impl Into<String>) -> Self {
        self.voice_task_id = Some(id.into());
        self
    }

    pub fn with_video_task_id(mut self, id: impl Into<String>) -> Self {
        self.video_task_id = Some(id.into());
        self
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Apply onto a job. Does not check the transition.
    pub fn apply_to(self, job: &mut ScriptJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if self.error_stage.is_some() {
            job.error_stage = self.error_stage;
        }
        if self.error_message.is_some() {
            job.error_message = self.error_message;
        }
        if self.audio_path.is_some() {
            job.audio_path = self.audio_path;
        }
        if self.subtitle_path.is_some() {
            job.subtitle_path = self.subtitle_path;
        }
        if self.video_path.is_some() {
            job.video_path = self.video_path;
        }
        if self.voice_task_id.is_some() {
            job.voice_task_id = self.voice_task_id;
        }
        if self.video_task_id.is_some() {
            job.video_task_id = self.video_task_id;
        }
        if self.started_at.is_some() {
            job.started_at = self.started_at;
        }
        if self.completed_at.is_some() {
            job.completed_at = self.completed_at;
        }
    }
}
