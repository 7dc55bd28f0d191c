use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{coordinator, handlers, jobs, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/resubmit", post(jobs::resubmit_job))
        .route("/jobs/{id}", get(jobs::get_job))
        // Coordinator
        .route("/coordinator/status", get(coordinator::get_status))
        .route("/coordinator/start", post(coordinator::start))
        .route("/coordinator/stop", post(coordinator::stop));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
