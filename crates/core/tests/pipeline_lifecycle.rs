//! Pipeline lifecycle integration tests.
//!
//! These tests run whole jobs through the pipeline controller against a
//! temporary workspace with mock voice and video services:
//! - Success path and file placement
//! - Failure stages and quarantine logs
//! - Exclusive use of the execution slot

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use narrato_core::{
    channel::{ConfigCache, JsonFileSource},
    job::{ErrorStage, JobStatus, JobStore, NewJob, SqliteJobStore},
    layout::WorkspaceLayout,
    pipeline::{error_log_path, PipelineController, PipelineError},
    placer::{FsPlacer, Placer, RetryPolicy},
    resources::{OverlayPool, ResourceCoordinator},
    testing::{fixtures, MockVideoClient, MockVoiceClient},
    video::{PollPolicy, RenderStatus, VideoAdapter},
    voice::VoiceAdapter,
};

/// Test helper wiring a controller to mocks.
struct TestHarness {
    controller: Arc<PipelineController>,
    voice: Arc<MockVoiceClient>,
    video: Arc<MockVideoClient>,
    store: Arc<SqliteJobStore>,
    resources: Arc<ResourceCoordinator>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_clients(|root| {
            (
                MockVoiceClient::new(root.join("sessions")),
                MockVideoClient::new(root.join("render-out")),
            )
        })
    }

    fn with_clients(
        make: impl FnOnce(&Path) -> (MockVoiceClient, MockVideoClient),
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let (voice, video) = make(&root);
        let voice = Arc::new(voice);
        let video = Arc::new(video);

        let layout = WorkspaceLayout::new(&root);
        let placer: Arc<dyn Placer> = Arc::new(FsPlacer::with_defaults());
        let overlays = OverlayPool::new(
            Arc::clone(&placer),
            vec!["png".to_string()],
            RetryPolicy::once(),
        );
        let configs =
            ConfigCache::with_default_ttl(Arc::new(JsonFileSource::new(layout.clone())));
        let resources = Arc::new(ResourceCoordinator::new(layout.clone(), overlays, configs));

        let store = Arc::new(
            SqliteJobStore::new(&root.join("test.db")).expect("Failed to create job store"),
        );
        let voice_adapter = Arc::new(VoiceAdapter::new(
            voice.clone(),
            Arc::clone(&placer),
            layout,
            root.join("sessions"),
            "http://localhost:8020",
        ));
        let video_adapter = Arc::new(
            VideoAdapter::new(
                video.clone(),
                Arc::clone(&placer),
                Arc::clone(&resources),
                root.join("render-out"),
            )
            .with_poll_policy(PollPolicy {
                interval: Duration::from_millis(10),
                max_attempts: 5,
            })
            .with_relocation_retry(RetryPolicy::new(2, Duration::from_millis(10))),
        );
        let controller = Arc::new(PipelineController::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::clone(&resources),
            voice_adapter,
            video_adapter,
            placer,
        ));

        Self {
            controller,
            voice,
            video,
            store,
            resources,
            temp_dir,
        }
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn create_job(&self, channel: &str, name: &str) -> (String, PathBuf) {
        let path = fixtures::write_script(self.root(), channel, name, "Once upon a time.");
        let job = self
            .store
            .create(NewJob::new(&path, channel))
            .expect("Failed to create job");
        (job.id, path)
    }
}

#[tokio::test]
async fn test_successful_job_places_every_file() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &["a.png", "b.png"]);
    let (job_id, script) = h.create_job("C1", "story.txt");

    let job = h.controller.run(&job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error_stage.is_none());
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert_eq!(job.video_task_id.as_deref(), Some("task-1"));

    // Script promoted.
    assert!(!script.exists());
    assert!(h.root().join("scripts/C1/processed/story.txt").exists());

    // Voice artifacts under assets, named after the session.
    let session = job.voice_task_id.clone().unwrap();
    assert!(session.starts_with("story_"));
    let audio = job.audio_path.clone().unwrap();
    assert_eq!(audio, h.root().join(format!("assets/audio/{}.wav", session)));
    assert!(audio.exists());
    assert!(job.subtitle_path.as_ref().unwrap().exists());

    // Video and the consumed overlay in the channel's final directory.
    let video = job.video_path.clone().unwrap();
    assert_eq!(
        video,
        h.root().join(format!("assets/final/C1/{}.mp4", session))
    );
    assert!(video.exists());
    assert!(h
        .root()
        .join(format!("assets/final/C1/{}_overlay.png", session))
        .exists());

    // Oldest overlay consumed, the other still pooled.
    assert!(!h.root().join("assets/overlay2/C1/a.png").exists());
    assert!(h.root().join("assets/overlay2/C1/b.png").exists());

    let requests = h.video.recorded_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].preset_name, "1");
    assert_eq!(h.controller.counters().completed, 1);
}

#[tokio::test]
async fn test_single_overlay_run_empties_pool() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &["only.png"]);
    let (job_id, _) = h.create_job("C1", "story.txt");

    let job = h.controller.run(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let pool: Vec<_> = std::fs::read_dir(h.root().join("assets/overlay2/C1"))
        .unwrap()
        .collect();
    assert!(pool.is_empty());

    let session = job.voice_task_id.clone().unwrap();
    let mut finals: Vec<String> = std::fs::read_dir(h.root().join("assets/final/C1"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    finals.sort();
    assert_eq!(
        finals,
        vec![format!("{}.mp4", session), format!("{}_overlay.png", session)]
    );
    assert_eq!(
        job.video_path,
        Some(h.root().join(format!("assets/final/C1/{}.mp4", session)))
    );
    assert!(h.root().join("scripts/C1/processed/story.txt").exists());
}

#[tokio::test]
async fn test_channel_config_reaches_voice_service() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C2", &["a.png"]);
    let mut config = narrato_core::ChannelConfig::default();
    config.voice_settings.speaker_voice = "EN_Narrator".to_string();
    config.video_settings.preset_name = "4".to_string();
    fixtures::write_channel_config(h.root(), "C2", &config);
    let (job_id, _) = h.create_job("C2", "s.txt");

    let job = h.controller.run(&job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let voice_calls = h.voice.recorded_requests().await;
    assert_eq!(voice_calls[0].settings.speaker_voice, "EN_Narrator");
    assert_eq!(h.video.recorded_requests().await[0].preset_name, "4");
}

#[tokio::test]
async fn test_video_timeout_quarantines_script() {
    let h = TestHarness::with_clients(|root| {
        (
            MockVoiceClient::new(root.join("sessions")),
            MockVideoClient::new(root.join("render-out")).never_completes(),
        )
    });
    fixtures::seed_overlays(h.root(), "C1", &["a.png"]);
    let (job_id, script) = h.create_job("C1", "s.txt");

    let job = h.controller.run(&job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error_stage, Some(ErrorStage::Video));
    assert_eq!(h.video.status_checks().await, 5);
    // Voice output survives the failure.
    assert!(job.audio_path.as_ref().unwrap().exists());

    let error_dir = h.root().join("scripts/C1/error");
    assert!(!script.exists());
    assert!(error_dir.join("s.txt").exists());
    let log = std::fs::read_to_string(error_log_path(&error_dir, "s.txt")).unwrap();
    assert!(log.contains("Error Stage: video"));
    assert!(log.contains(&format!("Job ID: {}", job_id)));
    assert!(log.contains("Audio Path:"));

    // The overlay was never consumed.
    assert!(h.root().join("assets/overlay2/C1/a.png").exists());
}

#[tokio::test]
async fn test_render_failure_reports_service_message() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &["a.png"]);
    h.video
        .set_statuses(vec![
            RenderStatus::Pending { status: None },
            RenderStatus::Failed {
                message: "encoder crashed".to_string(),
            },
        ])
        .await;
    let (job_id, _) = h.create_job("C1", "s.txt");

    let job = h.controller.run(&job_id).await.unwrap();

    assert_eq!(job.error_stage, Some(ErrorStage::Video));
    assert!(job.error_message.unwrap().contains("encoder crashed"));
    assert_eq!(h.video.status_checks().await, 2);
}

#[tokio::test]
async fn test_empty_overlay_pool_is_resource_error() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &[]);
    let (job_id, _) = h.create_job("C1", "s.txt");

    let job = h.controller.run(&job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error_stage, Some(ErrorStage::Resource));
    assert!(h.video.recorded_requests().await.is_empty());
    assert_eq!(h.video.status_checks().await, 0);
    assert!(h.root().join("scripts/C1/error/s.txt").exists());
}

#[tokio::test]
async fn test_missing_fixed_overlay_is_resource_error() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &["a.png"]);
    std::fs::remove_file(h.root().join("assets/overlay1/C1/overlay1.png")).unwrap();
    let (job_id, _) = h.create_job("C1", "s.txt");

    let job = h.controller.run(&job_id).await.unwrap();

    assert_eq!(job.error_stage, Some(ErrorStage::Resource));
    assert!(job.error_message.unwrap().contains("overlay1.png"));
    assert!(h.video.recorded_requests().await.is_empty());
    // Reservation released, overlay still pooled.
    assert!(h.root().join("assets/overlay2/C1/a.png").exists());
}

#[tokio::test]
async fn test_missing_subtitle_is_voice_error() {
    let h = TestHarness::with_clients(|root| {
        (
            MockVoiceClient::new(root.join("sessions")).without_subtitle(),
            MockVideoClient::new(root.join("render-out")),
        )
    });
    fixtures::seed_overlays(h.root(), "C1", &["a.png"]);
    let (job_id, _) = h.create_job("C1", "s.txt");

    let job = h.controller.run(&job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error_stage, Some(ErrorStage::Voice));
    assert!(h.video.recorded_requests().await.is_empty());

    let log = std::fs::read_to_string(error_log_path(
        &h.root().join("scripts/C1/error"),
        "s.txt",
    ))
    .unwrap();
    assert!(log.contains("Error Stage: voice"));
    assert!(log.contains("final.srt"));
}

#[tokio::test]
async fn test_job_must_be_pending() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &["a.png"]);
    let (job_id, _) = h.create_job("C1", "s.txt");

    h.controller.run(&job_id).await.unwrap();
    let err = h.controller.run(&job_id).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NotPending {
            status: JobStatus::Completed,
            ..
        }
    ));

    let err = h.controller.run("missing").await.unwrap_err();
    assert!(matches!(err, PipelineError::Job(_)));
}

#[tokio::test]
async fn test_job_runs_once_when_dispatched_twice() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &["a.png"]);
    let (job_id, _) = h.create_job("C1", "s.txt");

    // Hold the slot so the first run parks inside the controller.
    let guard = h.resources.acquire_slot("blocker").await.unwrap();
    let first = {
        let controller = Arc::clone(&h.controller);
        let job_id = job_id.clone();
        tokio::spawn(async move { controller.run(&job_id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.controller.is_in_flight(&job_id));

    let err = h.controller.run(&job_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotPending { .. }));

    drop(guard);
    let job = first.await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(!h.controller.is_in_flight(&job_id));
}

#[tokio::test]
async fn test_jobs_never_overlap() {
    let h = TestHarness::with_clients(|root| {
        (
            MockVoiceClient::new(root.join("sessions")).with_delay(Duration::from_millis(30)),
            MockVideoClient::new(root.join("render-out")),
        )
    });
    fixtures::seed_overlays(h.root(), "C1", &["a.png", "b.png", "c.png", "d.png"]);

    let mut handles = Vec::new();
    for i in 0..4 {
        let (job_id, _) = h.create_job("C1", &format!("s{}.txt", i));
        let controller = Arc::clone(&h.controller);
        handles.push(tokio::spawn(async move { controller.run(&job_id).await }));
    }

    for handle in handles {
        let job = handle.await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    assert_eq!(h.voice.max_concurrent_calls(), 1);
    assert_eq!(h.resources.slot_status().total_acquired, 4);
    assert!(h.resources.slot().is_free());
    assert_eq!(
        std::fs::read_dir(h.root().join("assets/overlay2/C1"))
            .unwrap()
            .count(),
        0
    );
}

#[tokio::test]
async fn test_slot_released_after_failure() {
    let h = TestHarness::new();
    fixtures::seed_overlays(h.root(), "C1", &["a.png"]);
    h.voice
        .set_next_error(narrato_core::voice::VoiceError::Timeout)
        .await;
    let (first, _) = h.create_job("C1", "first.txt");
    let (second, _) = h.create_job("C1", "second.txt");

    let failed = h.controller.run(&first).await.unwrap();
    assert_eq!(failed.error_stage, Some(ErrorStage::Voice));
    assert!(h.resources.slot().is_free());

    let done = h.controller.run(&second).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    let counters = h.controller.counters();
    assert_eq!(counters.failed, 1);
    assert_eq!(counters.completed, 1);
    assert_eq!(counters.active, 0);
}
