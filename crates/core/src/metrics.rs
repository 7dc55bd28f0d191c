//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion (scripts detected, jobs dispatched)
//! - Pipeline (outcomes, stage durations, slot contention)
//! - External services (voice and video requests, render polling)
//! - Resources (overlay pool exhaustion)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Ingestion
// =============================================================================

/// Script files seen by the watchers.
pub static SCRIPTS_DETECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "narrato_scripts_detected_total",
            "Script files detected in channel directories",
        ),
        &["channel"],
    )
    .unwrap()
});

/// Jobs created and queued for execution.
pub static JOBS_DISPATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("narrato_jobs_dispatched_total", "Jobs queued for execution"),
        &["origin"], // "watcher", "startup_scan", "resubmit"
    )
    .unwrap()
});

/// Paths refused because an active job already owns them.
pub static DUPLICATES_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "narrato_duplicate_scripts_skipped_total",
            "Scripts skipped because a job for the same path is still active",
        ),
        &["channel"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline
// =============================================================================

/// Terminal job outcomes.
pub static JOB_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("narrato_job_outcomes_total", "Jobs reaching a terminal state"),
        &["result", "stage"], // result: "completed", "error"; stage: "", "voice", "video", "resource", "unexpected"
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("narrato_stage_duration_seconds", "Duration of pipeline stages")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0]),
        &["stage", "result"], // stage: "voice", "video"; result: "success", "failed"
    )
    .unwrap()
});

/// Time spent waiting for the execution slot.
pub static SLOT_WAIT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "narrato_slot_wait_seconds",
            "Time jobs spend waiting for the execution slot",
        )
        .buckets(vec![0.01, 0.1, 1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
    )
    .unwrap()
});

// =============================================================================
// External Services
// =============================================================================

/// Requests to external services.
pub static EXTERNAL_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "narrato_external_requests_total",
            "Requests sent to external services",
        ),
        &["service", "operation", "status"], // status: "success", "error", "timeout"
    )
    .unwrap()
});

/// Status polls needed per render.
pub static VIDEO_POLL_ATTEMPTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "narrato_video_poll_attempts",
            "Status polls issued per render task",
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0]),
    )
    .unwrap()
});

// =============================================================================
// Resources
// =============================================================================

/// Overlay pool found empty.
pub static OVERLAY_POOL_EMPTY: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "narrato_overlay_pool_empty_total",
            "Overlay acquisitions that found the pool empty",
        ),
        &["channel"],
    )
    .unwrap()
});

/// Every core collector, for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Ingestion
        Box::new(SCRIPTS_DETECTED.clone()),
        Box::new(JOBS_DISPATCHED.clone()),
        Box::new(DUPLICATES_SKIPPED.clone()),
        // Pipeline
        Box::new(JOB_OUTCOMES.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(SLOT_WAIT_DURATION.clone()),
        // External services
        Box::new(EXTERNAL_REQUESTS.clone()),
        Box::new(VIDEO_POLL_ATTEMPTS.clone()),
        // Resources
        Box::new(OVERLAY_POOL_EMPTY.clone()),
    ]
}
