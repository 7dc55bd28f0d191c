//! Coordinator API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use narrato_core::CoordinatorStatus;

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Coordinator status response
#[derive(Debug, Serialize)]
pub struct CoordinatorStatusResponse {
    /// Whether a coordinator was built for this process (`coordinator.enabled`)
    pub available: bool,
    #[serde(flatten)]
    pub status: CoordinatorStatus,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct CoordinatorErrorResponse {
    pub error: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn unavailable() -> (StatusCode, Json<CoordinatorErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(CoordinatorErrorResponse {
            error: "Coordinator not available. Check that coordinator.enabled is set.".to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Get coordinator status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<CoordinatorStatusResponse> {
    match state.coordinator() {
        Some(coordinator) => Json(CoordinatorStatusResponse {
            available: true,
            status: coordinator.status().await,
        }),
        None => Json(CoordinatorStatusResponse {
            available: false,
            status: CoordinatorStatus::default(),
        }),
    }
}

/// Start the coordinator
pub async fn start(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, impl IntoResponse> {
    let Some(coordinator) = state.coordinator() else {
        return Err(unavailable());
    };

    match coordinator.start().await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Coordinator started".to_string(),
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CoordinatorErrorResponse {
                error: format!("Failed to start coordinator: {}", e),
            }),
        )),
    }
}

/// Stop the coordinator
pub async fn stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, impl IntoResponse> {
    match state.coordinator() {
        Some(coordinator) => {
            coordinator.stop().await;
            Ok(Json(MessageResponse {
                message: "Coordinator stopped".to_string(),
            }))
        }
        None => Err(unavailable()),
    }
}
