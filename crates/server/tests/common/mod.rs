//! Common test utilities for in-process API testing with mocks.
//!
//! The fixture builds the real router over a temporary workspace and a
//! SQLite job store. The coordinator, when enabled, runs against the mock
//! voice and video services from `narrato_core::testing`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use narrato_core::{
    testing::{MockVideoClient, MockVoiceClient},
    Config, Coordinator, JobStore, SqliteJobStore,
};
use narrato_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use narrato_core::testing::fixtures;

/// Test fixture for API testing with mock services.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_list_jobs() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.get("/api/v1/jobs").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Job store shared with the router
    pub job_store: Arc<SqliteJobStore>,
    /// Coordinator, when enabled
    pub coordinator: Option<Arc<Coordinator>>,
    /// Mock voice service, script failures with `set_next_error`
    pub voice: Arc<MockVoiceClient>,
    /// Mock video service
    pub video: Arc<MockVideoClient>,
    /// Workspace root, database included
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// API only, no coordinator.
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// API with a running coordinator.
    pub async fn with_coordinator() -> Self {
        let fixture = Self::build(true).await;
        if let Some(coordinator) = &fixture.coordinator {
            coordinator.start().await.expect("Failed to start coordinator");
            // Let the watchers register before tests drop scripts in.
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        fixture
    }

    async fn build(enable_coordinator: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config: Config = fixtures::test_config(temp_dir.path());
        config.coordinator.enabled = enable_coordinator;

        let job_store = Arc::new(
            SqliteJobStore::new(&config.database.path).expect("Failed to create job store"),
        );
        let voice = Arc::new(MockVoiceClient::new(config.voice_session_root()));
        let video = Arc::new(MockVideoClient::new(config.video_output_dir()));

        let coordinator = enable_coordinator.then(|| {
            Arc::new(Coordinator::from_config(
                &config,
                Arc::clone(&job_store) as Arc<dyn JobStore>,
                voice.clone(),
                video.clone(),
            ))
        });

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&job_store) as Arc<dyn JobStore>,
            coordinator.clone(),
        ));
        let router = create_router(state);

        Self {
            router,
            job_store,
            coordinator,
            voice,
            video,
            temp_dir,
        }
    }

    pub fn root(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Poll `GET /api/v1/jobs?status=...` until `count` jobs are listed.
    pub async fn wait_for_jobs(&self, status: &str, count: usize) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let response = self.get(&format!("/api/v1/jobs?status={}", status)).await;
            let jobs = response.body["jobs"].as_array().cloned().unwrap_or_default();
            if jobs.len() >= count {
                return jobs;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {} {} job(s), saw {}", count, status, jobs.len());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a plain-text endpoint.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
