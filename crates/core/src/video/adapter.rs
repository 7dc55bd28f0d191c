//! Video stage: submit a render, wait for it, move the results into place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channel::ResolvedChannelPaths;
use crate::config::Config;
use crate::metrics;
use crate::placer::{relocate_with_retry, Placer, Relocation, RetryPolicy};
use crate::resources::{OverlayReservation, ResourceCoordinator};

use super::client::{RenderRequest, RenderStatus, VideoClient};
use super::error::VideoError;

/// How long to wait for a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    /// 180 checks, 10 s apart: a 30 minute ceiling.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 180,
        }
    }
}

/// A submitted render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTask {
    pub task_id: String,
    pub output_name: String,
    pub channel: String,
    pub overlay: OverlayReservation,
    pub final_dir: PathBuf,
}

/// Where a finished render ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoOutput {
    pub task_id: String,
    pub video_path: PathBuf,
    pub overlay_path: PathBuf,
}

pub struct VideoAdapter {
    client: Arc<dyn VideoClient>,
    placer: Arc<dyn Placer>,
    resources: Arc<ResourceCoordinator>,
    output_dir: PathBuf,
    poll: PollPolicy,
    relocation_retry: RetryPolicy,
}

impl VideoAdapter {
    pub fn new(
        client: Arc<dyn VideoClient>,
        placer: Arc<dyn Placer>,
        resources: Arc<ResourceCoordinator>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            placer,
            resources,
            output_dir: output_dir.into(),
            poll: PollPolicy::default(),
            relocation_retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(
        client: Arc<dyn VideoClient>,
        placer: Arc<dyn Placer>,
        resources: Arc<ResourceCoordinator>,
        config: &Config,
    ) -> Self {
        Self::new(client, placer, resources, config.video_output_dir())
            .with_poll_policy(PollPolicy {
                interval: Duration::from_millis(config.video.poll_interval_ms),
                max_attempts: config.video.max_poll_attempts,
            })
            .with_relocation_retry(RetryPolicy::new(
                config.video.relocation_attempts,
                Duration::from_millis(config.video.relocation_backoff_ms),
            ))
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_relocation_retry(mut self, retry: RetryPolicy) -> Self {
        self.relocation_retry = retry;
        self
    }

    /// Output file name for an audio track: `{audio stem}.mp4`.
    pub fn output_name(audio_path: &Path) -> String {
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        format!("{}.mp4", stem)
    }

    /// Submit a render of the given voice artifacts with the channel's
    /// fixed overlay and the reserved pool overlay.
    pub async fn submit(
        &self,
        audio_path: &Path,
        subtitle_path: &Path,
        channel: &str,
        paths: &ResolvedChannelPaths,
        preset_name: &str,
        overlay: &OverlayReservation,
    ) -> Result<RenderTask, VideoError> {
        let request = RenderRequest {
            audio_path: audio_path.to_path_buf(),
            subtitle_path: subtitle_path.to_path_buf(),
            overlay1_path: paths.overlay1.clone(),
            overlay2_path: overlay.path.clone(),
            preset_name: preset_name.to_string(),
            output_name: Self::output_name(audio_path),
        };

        let result = self.client.submit(&request).await;
        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.metric_status(),
        };
        metrics::EXTERNAL_REQUESTS
            .with_label_values(&["video", "submit", status])
            .inc();
        let task_id = result?;

        info!(
            channel = %channel,
            task_id = %task_id,
            overlay = %overlay.path.display(),
            "Render submitted as {}",
            request.output_name
        );

        Ok(RenderTask {
            task_id,
            output_name: request.output_name,
            channel: channel.to_string(),
            overlay: overlay.clone(),
            final_dir: paths.final_dir.clone(),
        })
    }

    /// Poll until the render reaches a terminal status, then move the
    /// consumed overlay and the video into the channel's final directory.
    pub async fn complete(&self, task: &RenderTask) -> Result<VideoOutput, VideoError> {
        let reported = self.wait(task).await?;

        let video_stem = Path::new(&task.output_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| task.task_id.clone());
        let overlay_destination = task
            .final_dir
            .join(format!("{}_overlay.{}", video_stem, task.overlay.extension()));
        let overlay_path = self
            .resources
            .consume_overlay(&task.overlay, &overlay_destination)
            .await?;

        let source = match reported {
            Some(path) if path.is_absolute() => path,
            Some(path) => self.output_dir.join(path),
            None => self.output_dir.join(&task.output_name),
        };
        let relocation = Relocation::new(&source, task.final_dir.join(&task.output_name));
        let placed =
            relocate_with_retry(self.placer.as_ref(), &relocation, self.relocation_retry).await?;

        info!(
            channel = %task.channel,
            task_id = %task.task_id,
            "Render finished: {}",
            placed.destination.display()
        );

        Ok(VideoOutput {
            task_id: task.task_id.clone(),
            video_path: placed.destination,
            overlay_path,
        })
    }

    /// Submit and complete in one go.
    pub async fn render(
        &self,
        audio_path: &Path,
        subtitle_path: &Path,
        channel: &str,
        paths: &ResolvedChannelPaths,
        preset_name: &str,
        overlay: &OverlayReservation,
    ) -> Result<VideoOutput, VideoError> {
        let task = self
            .submit(audio_path, subtitle_path, channel, paths, preset_name, overlay)
            .await?;
        self.complete(&task).await
    }

    /// Returns the output path the service reported, if any.
    async fn wait(&self, task: &RenderTask) -> Result<Option<PathBuf>, VideoError> {
        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;

            match self.client.status(&task.task_id).await {
                Ok(RenderStatus::Succeeded { output_path }) => {
                    metrics::VIDEO_POLL_ATTEMPTS.observe(attempt as f64);
                    metrics::EXTERNAL_REQUESTS
                        .with_label_values(&["video", "status", "success"])
                        .inc();
                    return Ok(output_path);
                }
                Ok(RenderStatus::Failed { message }) => {
                    metrics::VIDEO_POLL_ATTEMPTS.observe(attempt as f64);
                    metrics::EXTERNAL_REQUESTS
                        .with_label_values(&["video", "status", "success"])
                        .inc();
                    return Err(VideoError::RenderFailed {
                        task_id: task.task_id.clone(),
                        message,
                    });
                }
                Ok(RenderStatus::Pending { status }) => {
                    metrics::EXTERNAL_REQUESTS
                        .with_label_values(&["video", "status", "success"])
                        .inc();
                    debug!(
                        task_id = %task.task_id,
                        "Render still running ({}/{}): {}",
                        attempt,
                        self.poll.max_attempts,
                        status.as_deref().unwrap_or("no status")
                    );
                }
                Err(e) => {
                    metrics::EXTERNAL_REQUESTS
                        .with_label_values(&["video", "status", e.metric_status()])
                        .inc();
                    warn!(
                        task_id = %task.task_id,
                        "Status check {}/{} failed: {}",
                        attempt,
                        self.poll.max_attempts,
                        e
                    );
                }
            }
        }

        metrics::VIDEO_POLL_ATTEMPTS.observe(self.poll.max_attempts as f64);
        Err(VideoError::Timeout {
            task_id: task.task_id.clone(),
            attempts: self.poll.max_attempts,
        })
    }
}
