//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use narrato_core::{CoordinatorError, ErrorStage, JobFilter, JobStatus, ScriptJob};

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status, e.g. `VOICE_DONE`
    pub status: Option<String>,
    pub channel: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Request body for resubmitting a quarantined script
#[derive(Debug, Deserialize)]
pub struct ResubmitBody {
    pub channel: String,
    pub file_name: String,
}

/// Response for job operations
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub channel: String,
    pub file_name: String,
    pub source_path: String,
    pub status: JobStatus,
    pub error_stage: Option<ErrorStage>,
    pub error_message: Option<String>,
    pub audio_path: Option<String>,
    pub subtitle_path: Option<String>,
    pub video_path: Option<String>,
    pub voice_task_id: Option<String>,
    pub video_task_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<ScriptJob> for JobResponse {
    fn from(job: ScriptJob) -> Self {
        let path = |p: Option<std::path::PathBuf>| p.map(|p| p.to_string_lossy().to_string());
        Self {
            id: job.id,
            channel: job.channel,
            file_name: job.file_name,
            source_path: job.source_path.to_string_lossy().to_string(),
            status: job.status,
            error_stage: job.error_stage,
            error_message: job.error_message,
            audio_path: path(job.audio_path),
            subtitle_path: path(job.subtitle_path),
            video_path: path(job.video_path),
            voice_task_id: job.voice_task_id,
            video_task_id: job.video_task_id,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<JobErrorResponse>) {
    (
        status,
        Json(JobErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.job_store().get(&id) {
        Ok(Some(job)) => Ok(Json(JobResponse::from(job))),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", id),
        )),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// List jobs with optional filters, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        match status.parse::<JobStatus>() {
            Ok(status) => filter = filter.with_status(status),
            Err(e) => return Err(error_response(StatusCode::BAD_REQUEST, e.to_string())),
        }
    }

    if let Some(ref channel) = params.channel {
        filter = filter.with_channel(channel);
    }

    let jobs = match state.job_store().list(&filter) {
        Ok(jobs) => jobs,
        Err(e) => return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    // Total ignores pagination
    let total = match state.job_store().count(&filter) {
        Ok(count) => count,
        Err(e) => return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Move a quarantined script back into its channel and queue a new job
pub async fn resubmit_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResubmitBody>,
) -> Result<(StatusCode, Json<JobResponse>), impl IntoResponse> {
    let Some(coordinator) = state.coordinator() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Coordinator not available",
        ));
    };

    match coordinator.resubmit(&body.channel, &body.file_name).await {
        Ok(job) => Ok((StatusCode::CREATED, Json(JobResponse::from(job)))),
        Err(e) => {
            let status = match e {
                CoordinatorError::InvalidChannel(_) | CoordinatorError::InvalidFileName(_) => {
                    StatusCode::BAD_REQUEST
                }
                CoordinatorError::NotQuarantined { .. } => StatusCode::NOT_FOUND,
                CoordinatorError::AlreadyActive { .. } => StatusCode::CONFLICT,
                CoordinatorError::NotRunning => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(error_response(status, e.to_string()))
        }
    }
}
