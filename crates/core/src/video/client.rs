//! HTTP client for the render service.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::VideoServiceConfig;

use super::error::VideoError;

/// Inputs of one render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub audio_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub overlay1_path: PathBuf,
    pub overlay2_path: PathBuf,
    pub preset_name: String,
    /// File name the service writes the video under.
    pub output_name: String,
}

/// What a status check says about a render task.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderStatus {
    /// Still running, or a status we do not recognize.
    Pending { status: Option<String> },
    /// Finished. `output_path` is set when the service reports it.
    Succeeded { output_path: Option<PathBuf> },
    Failed { message: String },
}

const SUCCESS_STATUSES: [&str; 5] = ["completed", "success", "succeeded", "done", "finished"];
const FAILURE_STATUSES: [&str; 3] = ["failed", "error", "cancelled"];

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RenderStatus {
    /// Classify a status response body. Only an explicit success word counts
    /// as success; anything unparseable or unknown is still pending.
    pub fn from_body(body: &str) -> Self {
        let parsed: StatusBody = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(_) => return RenderStatus::Pending { status: None },
        };

        let status = match parsed.status {
            Some(status) => status,
            None => return RenderStatus::Pending { status: None },
        };
        let normalized = status.trim().to_ascii_lowercase();

        if SUCCESS_STATUSES.contains(&normalized.as_str()) {
            RenderStatus::Succeeded {
                output_path: parsed
                    .output_path
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
            }
        } else if FAILURE_STATUSES.contains(&normalized.as_str()) {
            RenderStatus::Failed {
                message: parsed
                    .error
                    .or(parsed.message)
                    .unwrap_or_else(|| format!("render {}", normalized)),
            }
        } else {
            RenderStatus::Pending {
                status: Some(status),
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RenderStatus::Pending { .. })
    }
}

/// A service that renders videos asynchronously.
#[async_trait]
pub trait VideoClient: Send + Sync {
    fn name(&self) -> &str;

    /// Start a render and return its task id.
    async fn submit(&self, request: &RenderRequest) -> Result<String, VideoError>;

    /// Check on a render. Errors here are not fatal to the render.
    async fn status(&self, task_id: &str) -> Result<RenderStatus, VideoError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<serde_json::Value>,
}

/// Client for the render service's `/api/process` endpoints.
pub struct RenderServiceClient {
    client: Client,
    base_url: String,
}

impl RenderServiceClient {
    pub fn new(config: &VideoServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        }
    }

    fn path_field(path: &std::path::Path) -> String {
        path.to_string_lossy().replace('\\', "/")
    }
}

#[async_trait]
impl VideoClient for RenderServiceClient {
    fn name(&self) -> &str {
        "render-service"
    }

    async fn submit(&self, request: &RenderRequest) -> Result<String, VideoError> {
        let url = format!("{}/api/process/make", self.base_url);

        let form = [
            ("request", String::new()),
            ("audio_path", Self::path_field(&request.audio_path)),
            ("subtitle_path", Self::path_field(&request.subtitle_path)),
            ("overlay1_path", Self::path_field(&request.overlay1_path)),
            ("overlay2_path", Self::path_field(&request.overlay2_path)),
            ("preset_name", request.preset_name.clone()),
            ("output_name", request.output_name.clone()),
        ];
        debug!(output = %request.output_name, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(VideoError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(VideoError::from_reqwest)?;
        if !status.is_success() {
            return Err(VideoError::ServiceError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|e| VideoError::InvalidResponse(format!("submit body: {}", e)))?;

        // Some deployments return numeric ids.
        match parsed.task_id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id),
            Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
            _ => Err(VideoError::InvalidResponse(
                "no task_id in submit response".to_string(),
            )),
        }
    }

    async fn status(&self, task_id: &str) -> Result<RenderStatus, VideoError> {
        let url = format!(
            "{}/api/process/status/{}",
            self.base_url,
            urlencoding::encode(task_id)
        );

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(VideoError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(VideoError::from_reqwest)?;
        if !status.is_success() {
            return Err(VideoError::ServiceError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(RenderStatus::from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path as AxumPath,
        http::StatusCode,
        routing::{get, post},
        Form, Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(url: String) -> RenderServiceClient {
        RenderServiceClient::new(&VideoServiceConfig {
            url,
            request_timeout_secs: 5,
            ..Default::default()
        })
    }

    fn request() -> RenderRequest {
        RenderRequest {
            audio_path: PathBuf::from("/wf/assets/audio/s_1.wav"),
            subtitle_path: PathBuf::from("/wf/assets/srt/s_1.srt"),
            overlay1_path: PathBuf::from("/wf/assets/overlay1/C1/overlay1.png"),
            overlay2_path: PathBuf::from("/wf/assets/overlay2/C1/a.png"),
            preset_name: "1".to_string(),
            output_name: "s_1.mp4".to_string(),
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            RenderStatus::from_body(r#"{"status":"Completed"}"#),
            RenderStatus::Succeeded { output_path: None }
        );
        assert_eq!(
            RenderStatus::from_body(r#"{"status":"done","output_path":"/out/s.mp4"}"#),
            RenderStatus::Succeeded {
                output_path: Some(PathBuf::from("/out/s.mp4"))
            }
        );
        assert_eq!(
            RenderStatus::from_body(r#"{"status":"error","error":"ffmpeg exited 1"}"#),
            RenderStatus::Failed {
                message: "ffmpeg exited 1".to_string()
            }
        );
        assert_eq!(
            RenderStatus::from_body(r#"{"status":"cancelled","message":"by user"}"#),
            RenderStatus::Failed {
                message: "by user".to_string()
            }
        );
        assert_eq!(
            RenderStatus::from_body(r#"{"status":"processing","progress":40}"#),
            RenderStatus::Pending {
                status: Some("processing".to_string())
            }
        );
    }

    #[test]
    fn test_ok_without_status_is_not_success() {
        assert!(!RenderStatus::from_body("{}").is_terminal());
        assert!(!RenderStatus::from_body("OK").is_terminal());
        assert!(!RenderStatus::from_body(r#"{"status": 1}"#).is_terminal());
    }

    #[tokio::test]
    async fn test_submit_sends_form_and_reads_task_id() {
        let received: Arc<Mutex<Option<HashMap<String, String>>>> = Arc::new(Mutex::new(None));
        let sink = received.clone();
        let router = Router::new().route(
            "/api/process/make",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(form);
                    Json(serde_json::json!({ "task_id": "task-42" }))
                }
            }),
        );
        let client = client_for(serve(router).await);

        let task_id = client.submit(&request()).await.unwrap();
        assert_eq!(task_id, "task-42");

        let form = received.lock().unwrap().clone().unwrap();
        assert_eq!(form["output_name"], "s_1.mp4");
        assert_eq!(form["preset_name"], "1");
        assert_eq!(form["overlay2_path"], "/wf/assets/overlay2/C1/a.png");
        assert_eq!(form["request"], "");
    }

    #[tokio::test]
    async fn test_submit_without_task_id() {
        let router = Router::new().route(
            "/api/process/make",
            post(|| async { Json(serde_json::json!({ "queued": true })) }),
        );
        let client = client_for(serve(router).await);

        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, VideoError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let router = Router::new().route(
            "/api/process/make",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "bad preset") }),
        );
        let client = client_for(serve(router).await);

        match client.submit(&request()).await {
            Err(VideoError::ServiceError(msg)) => assert!(msg.contains("bad preset")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_reads_task() {
        let router = Router::new().route(
            "/api/process/status/{task_id}",
            get(|AxumPath(task_id): AxumPath<String>| async move {
                Json(serde_json::json!({
                    "status": "completed",
                    "output_path": format!("/out/{}.mp4", task_id),
                }))
            }),
        );
        let client = client_for(serve(router).await);

        let status = client.status("task-7").await.unwrap();
        assert_eq!(
            status,
            RenderStatus::Succeeded {
                output_path: Some(PathBuf::from("/out/task-7.mp4"))
            }
        );
    }

    #[tokio::test]
    async fn test_status_http_error_is_err() {
        let router = Router::new().route(
            "/api/process/status/{task_id}",
            get(|| async { StatusCode::NOT_FOUND }),
        );
        let client = client_for(serve(router).await);

        assert!(client.status("task-7").await.is_err());
    }
}
