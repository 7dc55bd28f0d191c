//! Coordinator implementation.
//!
//! Wires ingestion to execution:
//! - Watchers: one per channel, feeding a single dispatch loop
//! - Dispatch: creates jobs and queues their ids
//! - Workers: pull ids and run the pipeline; the execution slot keeps
//!   actual runs strictly one at a time

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::channel::{ConfigCache, JsonFileSource};
use crate::config::Config;
use crate::job::{JobFilter, JobStatus, JobStore, ScriptJob};
use crate::layout::{validate_channel_name, WorkspaceLayout};
use crate::pipeline::{PipelineController, PipelineError};
use crate::placer::{FsPlacer, Placer, Relocation, RetryPolicy};
use crate::resources::{OverlayPool, ResourceCoordinator};
use crate::video::{VideoAdapter, VideoClient};
use crate::voice::{VoiceAdapter, VoiceClient};
use crate::watcher::{
    scan_existing, ChannelWatcher, ChannelWatcherConfig, DispatchOrigin, Dispatcher, ScriptEvent,
};

use super::config::CoordinatorSettings;
use super::types::{CoordinatorError, CoordinatorStatus};

/// Message recorded on jobs found mid-run at startup.
const INTERRUPTED_MESSAGE: &str = "interrupted by restart";

/// The coordinator: watches channels and drives scripts through the pipeline.
pub struct Coordinator {
    settings: CoordinatorSettings,
    store: Arc<dyn JobStore>,
    resources: Arc<ResourceCoordinator>,
    pipeline: Arc<PipelineController>,
    placer: Arc<dyn Placer>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    dispatcher: RwLock<Option<Dispatcher>>,
    channels: RwLock<Vec<String>>,
}

impl Coordinator {
    pub fn new(
        settings: CoordinatorSettings,
        store: Arc<dyn JobStore>,
        resources: Arc<ResourceCoordinator>,
        pipeline: Arc<PipelineController>,
        placer: Arc<dyn Placer>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            settings,
            store,
            resources,
            pipeline,
            placer,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            dispatcher: RwLock::new(None),
            channels: RwLock::new(Vec::new()),
        }
    }

    /// Assemble the full stack from process configuration and the two
    /// service clients.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn JobStore>,
        voice_client: Arc<dyn VoiceClient>,
        video_client: Arc<dyn VideoClient>,
    ) -> Self {
        let layout = WorkspaceLayout::new(&config.workspace.root);
        let placer: Arc<dyn Placer> = Arc::new(FsPlacer::with_defaults());

        let overlays = OverlayPool::new(
            Arc::clone(&placer),
            config.coordinator.overlay_extensions.clone(),
            RetryPolicy::new(
                config.video.relocation_attempts,
                Duration::from_millis(config.video.relocation_backoff_ms),
            ),
        );
        let configs = ConfigCache::new(
            Arc::new(JsonFileSource::new(layout.clone())),
            Duration::from_secs(config.coordinator.config_cache_ttl_secs),
        );
        let resources = Arc::new(
            ResourceCoordinator::new(layout, overlays, configs)
                .with_default_fallback(config.coordinator.fallback_to_default_channel_config),
        );

        let voice = Arc::new(VoiceAdapter::from_config(
            voice_client,
            Arc::clone(&placer),
            config,
        ));
        let video = Arc::new(VideoAdapter::from_config(
            video_client,
            Arc::clone(&placer),
            Arc::clone(&resources),
            config,
        ));
        let pipeline = Arc::new(PipelineController::new(
            Arc::clone(&store),
            Arc::clone(&resources),
            voice,
            video,
            Arc::clone(&placer),
        ));

        Self::new(
            CoordinatorSettings::from(config),
            store,
            resources,
            pipeline,
            placer,
        )
    }

    pub fn resources(&self) -> &Arc<ResourceCoordinator> {
        &self.resources
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the coordinator (spawns background tasks).
    ///
    /// Prepares the workspace, recovers jobs a previous process left
    /// mid-run, queues scripts already waiting and starts one watcher per
    /// channel.
    pub async fn start(&self) -> Result<(), CoordinatorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Coordinator already running");
            return Ok(());
        }

        info!("Starting coordinator");

        match self.prepare_and_spawn().await {
            Ok(channels) => {
                info!("Coordinator started, watching {} channel(s)", channels.len());
                *self.channels.write().await = channels;
                Ok(())
            }
            Err(e) => {
                // Tear down whatever was spawned before the failure.
                let _ = self.shutdown_tx.send(());
                *self.dispatcher.write().await = None;
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn prepare_and_spawn(&self) -> Result<Vec<String>, CoordinatorError> {
        let layout = self.resources.layout();
        layout.ensure_base_directories().await?;
        let channels = layout
            .discover_or_create_channels(&self.settings.default_channel)
            .await?;
        for channel in &channels {
            layout.ensure_channel_directories(channel).await?;
        }

        let recovered = self.recover_interrupted_jobs().await;

        let (queue_tx, queue_rx) = mpsc::channel(self.settings.queue_capacity);
        let (event_tx, event_rx) = mpsc::channel(self.settings.queue_capacity);
        let dispatcher = Dispatcher::new(Arc::clone(&self.store), queue_tx.clone());

        self.spawn_workers(queue_rx);
        self.spawn_dispatch_loop(dispatcher.clone(), event_rx);
        *self.dispatcher.write().await = Some(dispatcher);

        let mut backlog = Vec::new();
        for channel in &channels {
            let dir = layout.channel_dir(channel);
            let watcher = ChannelWatcher::new(ChannelWatcherConfig {
                channel: channel.clone(),
                dir: dir.clone(),
                extension: self.settings.script_extension.clone(),
                settle_delay: self.settings.settle_delay,
            });

            for path in &recovered.sources {
                watcher.mark_seen(path);
            }
            if self.settings.scan_existing {
                for path in scan_existing(&dir, &self.settings.script_extension).await? {
                    watcher.mark_seen(&path);
                    if recovered.sources.contains(&path) {
                        continue;
                    }
                    backlog.push(ScriptEvent {
                        channel: channel.clone(),
                        path,
                        origin: DispatchOrigin::StartupScan,
                    });
                }
            }

            watcher.spawn(event_tx.clone(), self.shutdown_tx.subscribe())?;
        }

        if !recovered.pending.is_empty() || !backlog.is_empty() {
            info!(
                "Queueing {} pending job(s) and {} script(s) found at startup",
                recovered.pending.len(),
                backlog.len()
            );
            self.spawn_backlog(recovered.pending, queue_tx, backlog, event_tx);
        }

        Ok(channels)
    }

    /// Stop the coordinator gracefully.
    ///
    /// Watchers and idle workers exit at once. A run already in progress
    /// is left to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Coordinator not running");
            return;
        }

        info!("Stopping coordinator");

        // Signal shutdown to all tasks
        let _ = self.shutdown_tx.send(());
        *self.dispatcher.write().await = None;

        // Give workers a moment to finish current work
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Coordinator stopped");
    }

    /// Get current coordinator status.
    pub async fn status(&self) -> CoordinatorStatus {
        let count = |status: JobStatus| {
            self.store
                .count(&JobFilter::new().with_status(status))
                .unwrap_or(0) as usize
        };

        CoordinatorStatus {
            running: self.is_running(),
            channels: self.channels.read().await.clone(),
            workers: self.settings.workers,
            slot: self.resources.slot_status(),
            pending_count: count(JobStatus::Pending),
            voice_in_progress_count: count(JobStatus::VoiceInProgress),
            voice_done_count: count(JobStatus::VoiceDone),
            video_in_progress_count: count(JobStatus::VideoInProgress),
            completed_count: count(JobStatus::Completed),
            error_count: count(JobStatus::Error),
            ..Default::default()
        }
        .with_counters(self.pipeline.counters())
    }

    /// Move a quarantined script back into its channel and queue it again.
    pub async fn resubmit(
        &self,
        channel: &str,
        file_name: &str,
    ) -> Result<ScriptJob, CoordinatorError> {
        validate_channel_name(channel)
            .map_err(|_| CoordinatorError::InvalidChannel(channel.to_string()))?;
        if !is_bare_file_name(file_name) {
            return Err(CoordinatorError::InvalidFileName(file_name.to_string()));
        }

        let dispatcher = self
            .dispatcher
            .read()
            .await
            .clone()
            .ok_or(CoordinatorError::NotRunning)?;

        let layout = self.resources.layout();
        let quarantined = layout.error_dir(channel).join(file_name);
        if !quarantined.is_file() {
            return Err(CoordinatorError::NotQuarantined {
                channel: channel.to_string(),
                file_name: file_name.to_string(),
            });
        }

        let target = layout.channel_dir(channel).join(file_name);
        if self.store.find_active_by_source(&target)?.is_some() {
            return Err(CoordinatorError::AlreadyActive {
                channel: channel.to_string(),
                file_name: file_name.to_string(),
            });
        }

        let relocation = Relocation::new(&quarantined, &target).without_overwrite();
        self.placer.relocate(&relocation).await?;
        info!(channel = %channel, "Resubmitting {}", file_name);

        let event = ScriptEvent {
            channel: channel.to_string(),
            path: target,
            origin: DispatchOrigin::Resubmit,
        };
        dispatcher
            .dispatch(event)
            .await?
            .ok_or_else(|| CoordinatorError::AlreadyActive {
                channel: channel.to_string(),
                file_name: file_name.to_string(),
            })
    }

    /// Deal with non-terminal jobs nobody is running. PENDING jobs, left
    /// over by a crash or by `stop` dropping the queue, are queued again
    /// oldest first. Jobs caught mid-run are failed and quarantined.
    async fn recover_interrupted_jobs(&self) -> Recovered {
        let mut recovered = Recovered::default();
        let mut abandoned = 0;
        for status in JobStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            let filter = JobFilter::new().with_status(status).with_limit(i64::MAX);
            let jobs = match self.store.list(&filter) {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!("Failed to list {} jobs for recovery: {}", status, e);
                    continue;
                }
            };
            // Listed newest first.
            for job in jobs.into_iter().rev() {
                if self.pipeline.is_in_flight(&job.id) {
                    continue;
                }
                recovered.sources.insert(job.source_path.clone());
                if status == JobStatus::Pending {
                    recovered.pending.push(job.id);
                } else if self.pipeline.abandon(&job, INTERRUPTED_MESSAGE).await.is_some() {
                    abandoned += 1;
                }
            }
        }
        if abandoned > 0 {
            warn!("Quarantined {} job(s) interrupted mid-run", abandoned);
        }
        recovered
    }

    fn spawn_workers(&self, queue: mpsc::Receiver<String>) {
        let queue = Arc::new(Mutex::new(queue));

        for worker in 0..self.settings.workers {
            let queue = Arc::clone(&queue);
            let pipeline = Arc::clone(&self.pipeline);
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            tokio::spawn(async move {
                debug!("Worker {} started", worker);
                loop {
                    let next = tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        next = async { queue.lock().await.recv().await } => next,
                    };
                    let Some(job_id) = next else { break };

                    match pipeline.run(&job_id).await {
                        Ok(job) => debug!("Worker {} finished job {} as {}", worker, job.id, job.status),
                        Err(PipelineError::ShuttingDown) => break,
                        Err(e) => error!("Worker {} could not run job {}: {}", worker, job_id, e),
                    }
                }
                debug!("Worker {} stopped", worker);
            });
        }
    }

    fn spawn_dispatch_loop(&self, dispatcher: Dispatcher, mut events: mpsc::Receiver<ScriptEvent>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Dispatch loop shutting down");
                        break;
                    }
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        let path = event.path.clone();
                        if let Err(e) = dispatcher.dispatch(event).await {
                            error!("Failed to dispatch {}: {}", path.display(), e);
                        }
                    }
                }
            }
        });
    }

    /// Feed recovered jobs to the workers, then startup-scan results to the
    /// dispatch loop, without blocking `start` on queue capacity.
    fn spawn_backlog(
        &self,
        pending: Vec<String>,
        queue: mpsc::Sender<String>,
        backlog: Vec<ScriptEvent>,
        events: mpsc::Sender<ScriptEvent>,
    ) {
        tokio::spawn(async move {
            for job_id in pending {
                if queue.send(job_id).await.is_err() {
                    debug!("Workers gone, dropping recovered jobs");
                    return;
                }
            }
            for event in backlog {
                if events.send(event).await.is_err() {
                    debug!("Dispatch loop gone, dropping startup backlog");
                    return;
                }
            }
        });
    }
}

/// Outcome of startup recovery.
#[derive(Debug, Default)]
struct Recovered {
    /// PENDING job ids to queue again, oldest first.
    pending: Vec<String>,
    /// Scripts owned by recovered jobs; the scan leaves them alone.
    sources: HashSet<PathBuf>,
}

/// A plain file name: no separators, no parent references.
fn is_bare_file_name(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .map(|n| n == name)
        .unwrap_or(false)
}
