//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the narrato server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Coordinator state, job counts and slot occupancy (collected dynamically)
//!
//! Pipeline and external service metrics live in `narrato_core::metrics`
//! and are registered here as well.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use narrato_core::{JobFilter, JobStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "narrato_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("narrato_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "narrato_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Coordinator Metrics (collected dynamically)
// =============================================================================

/// Coordinator running state (1 = running, 0 = stopped).
pub static COORDINATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "narrato_coordinator_running",
        "Whether the coordinator is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Jobs by current status.
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("narrato_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

/// Execution slot occupancy (1 = held, 0 = free).
pub static SLOT_HELD: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "narrato_execution_slot_held",
        "Whether a job currently holds the execution slot",
    )
    .unwrap()
});

/// Jobs blocked waiting for the execution slot.
pub static SLOT_WAITING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "narrato_execution_slot_waiting",
        "Number of jobs waiting for the execution slot",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Coordinator
    registry
        .register(Box::new(COORDINATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();
    registry.register(Box::new(SLOT_HELD.clone())).unwrap();
    registry.register(Box::new(SLOT_WAITING.clone())).unwrap();

    // Core metrics (ingestion, pipeline, external services)
    for metric in narrato_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("metrics are not valid UTF-8: {}", e))
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the job store and the
/// coordinator at scrape time.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Some(coordinator) = state.coordinator() {
        COORDINATOR_RUNNING.set(if coordinator.is_running() { 1 } else { 0 });
        let slot = coordinator.resources().slot_status();
        SLOT_HELD.set(if slot.held_by.is_some() { 1 } else { 0 });
        SLOT_WAITING.set(slot.waiting as i64);
    }

    let job_store = state.job_store();
    for status in JobStatus::ALL {
        let filter = JobFilter::new().with_status(status);
        if let Ok(count) = job_store.count(&filter) {
            JOBS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_REGEX.replace_all(path, "{id}");
    let result = NUMERIC_REGEX.replace_all(&result, "/{id}$1");
    result.to_string()
}
