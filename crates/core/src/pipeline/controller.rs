//! Drives one job through voice and video.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::channel::{ChannelConfig, ResolvedChannelPaths};
use crate::job::{JobError, JobStatus, JobStore, JobUpdate, ScriptJob};
use crate::metrics;
use crate::placer::Placer;
use crate::resources::{OverlayReservation, ResourceCoordinator, ResourceError};
use crate::video::{VideoAdapter, VideoOutput};
use crate::voice::VoiceAdapter;

use super::error::{PipelineError, StageError};
use super::quarantine::{self, FailureReport, PartialArtifacts};

/// Counters over all runs.
#[derive(Debug, Default)]
struct PipelineStats {
    active: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of [`PipelineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineCounters {
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

pub struct PipelineController {
    store: Arc<dyn JobStore>,
    resources: Arc<ResourceCoordinator>,
    voice: Arc<VoiceAdapter>,
    video: Arc<VideoAdapter>,
    placer: Arc<dyn Placer>,
    stats: PipelineStats,
    /// Jobs inside `run`, waiting for the slot or executing.
    in_flight: Mutex<HashSet<String>>,
}

/// Removes a job from the in-flight set on every exit from `run`.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    job_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.job_id);
        }
    }
}

impl PipelineController {
    pub fn new(
        store: Arc<dyn JobStore>,
        resources: Arc<ResourceCoordinator>,
        voice: Arc<VoiceAdapter>,
        video: Arc<VideoAdapter>,
        placer: Arc<dyn Placer>,
    ) -> Self {
        Self {
            store,
            resources,
            voice,
            video,
            placer,
            stats: PipelineStats::default(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a `run` call currently owns this job.
    pub fn is_in_flight(&self, job_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(job_id))
            .unwrap_or(false)
    }

    fn enter(&self, job_id: &str) -> Option<InFlight<'_>> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(job_id.to_string()) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            job_id: job_id.to_string(),
        })
    }

    pub fn counters(&self) -> PipelineCounters {
        PipelineCounters {
            active: self.stats.active.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Run a PENDING job to COMPLETED or ERROR.
    ///
    /// Stage failures are not errors of this call: they are recorded on the
    /// job, which is returned in its terminal state. `Err` means the job
    /// could not be run at all.
    pub async fn run(&self, job_id: &str) -> Result<ScriptJob, PipelineError> {
        let job = self
            .store
            .get(job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Pending {
            return Err(PipelineError::NotPending {
                job_id: job.id,
                status: job.status,
            });
        }

        let Some(_in_flight) = self.enter(&job.id) else {
            return Err(PipelineError::NotPending {
                job_id: job.id,
                status: job.status,
            });
        };

        let _slot = match self.resources.acquire_slot(&job.id).await {
            Ok(guard) => guard,
            Err(ResourceError::SlotClosed) => return Err(PipelineError::ShuttingDown),
            Err(e) => {
                return Ok(self
                    .fail(&job, &PartialArtifacts::default(), StageError::Resource(e))
                    .await);
            }
        };

        self.stats.active.fetch_add(1, Ordering::Relaxed);
        let mut artifacts = PartialArtifacts::default();
        let outcome = AssertUnwindSafe(self.execute(&job, &mut artifacts))
            .catch_unwind()
            .await;
        self.stats.active.fetch_sub(1, Ordering::Relaxed);

        let result = match outcome {
            Ok(Ok(done)) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                metrics::JOB_OUTCOMES
                    .with_label_values(&["completed", ""])
                    .inc();
                done
            }
            Ok(Err(e)) => self.fail(&job, &artifacts, e).await,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.fail(
                    &job,
                    &artifacts,
                    StageError::Unexpected(format!("job panicked: {}", message)),
                )
                .await
            }
        };

        Ok(result)
    }

    /// Fail a job a previous process left mid-run. It goes through the
    /// same quarantine as any other failure, so its script waits in
    /// `error/` for a manual resubmit. Returns `None` if the job is
    /// running here after all.
    pub async fn abandon(&self, job: &ScriptJob, reason: &str) -> Option<ScriptJob> {
        let _in_flight = self.enter(&job.id)?;
        let artifacts = PartialArtifacts {
            audio_path: job.audio_path.clone(),
            subtitle_path: job.subtitle_path.clone(),
            video_path: job.video_path.clone(),
            overlay_path: None,
        };
        Some(
            self.fail(job, &artifacts, StageError::Unexpected(reason.to_string()))
                .await,
        )
    }

    async fn execute(
        &self,
        job: &ScriptJob,
        artifacts: &mut PartialArtifacts,
    ) -> Result<ScriptJob, StageError> {
        let session = VoiceAdapter::new_session(&job.source_path);
        self.store.update(
            &job.id,
            JobUpdate::status(JobStatus::VoiceInProgress)
                .with_started_at(Utc::now())
                .with_voice_task_id(&session),
        )?;
        info!(job_id = %job.id, channel = %job.channel, "Job {} started", job.file_name);

        let config = self.resources.channel_config(&job.channel).await?;

        // Voice
        let started = Instant::now();
        let voice = self
            .voice
            .synthesize(&job.source_path, &job.channel, &config.voice_settings, &session)
            .await;
        observe_stage("voice", started, voice.is_ok());
        let voice = voice?;
        artifacts.audio_path = Some(voice.audio_path.clone());
        artifacts.subtitle_path = Some(voice.subtitle_path.clone());
        self.store.update(
            &job.id,
            JobUpdate::status(JobStatus::VoiceDone)
                .with_audio(voice.audio_path.clone(), voice.subtitle_path.clone()),
        )?;

        // Resources for the render
        let paths = self.resources.resolve_paths(&job.channel, &config);
        let overlay = self
            .resources
            .acquire_next_overlay(&job.channel, &config)
            .await?;
        if let Err(e) = self.resources.validate_paths(&[
            voice.audio_path.as_path(),
            voice.subtitle_path.as_path(),
            paths.overlay1.as_path(),
            overlay.path.as_path(),
        ]) {
            self.resources.release_overlay(overlay);
            return Err(e.into());
        }
        artifacts.overlay_path = Some(overlay.path.clone());
        self.store
            .update(&job.id, JobUpdate::status(JobStatus::VideoInProgress))?;

        // Video
        let started = Instant::now();
        let rendered = self
            .render(job, &voice.audio_path, &voice.subtitle_path, &paths, &config, &overlay)
            .await;
        observe_stage("video", started, rendered.is_ok());
        let video = match rendered {
            Ok(video) => video,
            Err(e) => {
                if overlay.path.exists() {
                    self.resources.release_overlay(overlay);
                }
                return Err(e);
            }
        };
        artifacts.video_path = Some(video.video_path.clone());
        artifacts.overlay_path = Some(video.overlay_path.clone());

        quarantine::promote(self.placer.as_ref(), self.resources.layout(), job)
            .await
            .map_err(|e| StageError::Unexpected(format!("failed to move script: {}", e)))?;

        let done = self.store.update(
            &job.id,
            JobUpdate::status(JobStatus::Completed)
                .with_video_path(video.video_path)
                .with_completed_at(Utc::now()),
        )?;
        info!(job_id = %job.id, channel = %job.channel, "Job {} completed", job.file_name);
        Ok(done)
    }

    async fn render(
        &self,
        job: &ScriptJob,
        audio: &Path,
        subtitle: &Path,
        paths: &ResolvedChannelPaths,
        config: &ChannelConfig,
        overlay: &OverlayReservation,
    ) -> Result<VideoOutput, StageError> {
        let task = self
            .video
            .submit(
                audio,
                subtitle,
                &job.channel,
                paths,
                &config.video_settings.preset_name,
                overlay,
            )
            .await?;
        self.store.update(
            &job.id,
            JobUpdate::default().with_video_task_id(&task.task_id),
        )?;
        Ok(self.video.complete(&task).await?)
    }

    /// Quarantine the script and record ERROR. Never fails: problems while
    /// cleaning up are logged.
    async fn fail(
        &self,
        job: &ScriptJob,
        artifacts: &PartialArtifacts,
        cause: StageError,
    ) -> ScriptJob {
        let stage = cause.stage();
        let message = cause.to_string();
        error!(
            job_id = %job.id,
            channel = %job.channel,
            stage = %stage,
            "Job {} failed: {}",
            job.file_name,
            message
        );

        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        metrics::JOB_OUTCOMES
            .with_label_values(&["error", stage.as_str()])
            .inc();

        let report = FailureReport {
            job_id: job.id.clone(),
            channel: job.channel.clone(),
            stage,
            message: message.clone(),
            timestamp: Utc::now(),
            artifacts: artifacts.clone(),
        };
        if let Err(e) =
            quarantine::quarantine(self.placer.as_ref(), self.resources.layout(), job, &report)
                .await
        {
            warn!(job_id = %job.id, "Failed to quarantine {}: {}", job.file_name, e);
        }

        match self.store.update(&job.id, JobUpdate::error(stage, message)) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(job_id = %job.id, "Failed to record error: {}", e);
                self.store
                    .get(&job.id)
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| job.clone())
            }
        }
    }
}

fn observe_stage(stage: &str, started: Instant, ok: bool) {
    let result = if ok { "success" } else { "failed" };
    metrics::STAGE_DURATION
        .with_label_values(&[stage, result])
        .observe(started.elapsed().as_secs_f64());
}
