//! HTTP client for the speech synthesis service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::channel::VoiceSettings;
use crate::config::VoiceServiceConfig;

use super::error::VoiceError;

/// Body of one synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceRequest {
    pub source_file: String,
    pub session_name: String,
    pub xtts_server_url: String,
    #[serde(flatten)]
    pub settings: VoiceSettings,
}

/// A service that turns a script into `final.wav` and `final.srt` inside
/// its session directory.
#[async_trait]
pub trait VoiceClient: Send + Sync {
    fn name(&self) -> &str;

    /// Run synthesis to completion. Returns once the service answered 2xx.
    async fn synthesize(&self, request: &VoiceRequest) -> Result<(), VoiceError>;
}

/// Client for the Pandrator voice service.
pub struct PandratorClient {
    client: Client,
    base_url: String,
}

impl PandratorClient {
    pub fn new(config: &VoiceServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VoiceClient for PandratorClient {
    fn name(&self) -> &str {
        "pandrator"
    }

    async fn synthesize(&self, request: &VoiceRequest) -> Result<(), VoiceError> {
        let url = format!("{}/process_with_pandrator", self.base_url);
        debug!(session = %request.session_name, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(VoiceError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(VoiceError::ServiceError(format!(
            "HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(url: String) -> PandratorClient {
        PandratorClient::new(&VoiceServiceConfig {
            url,
            timeout_secs: 5,
            ..Default::default()
        })
    }

    fn request() -> VoiceRequest {
        VoiceRequest {
            source_file: "/wf/scripts/C1/s.txt".to_string(),
            session_name: "s_0123".to_string(),
            xtts_server_url: "http://localhost:8020".to_string(),
            settings: VoiceSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_posts_flattened_payload() {
        let received: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
        let sink = received.clone();
        let router = Router::new().route(
            "/process_with_pandrator",
            post(move |Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(body);
                    StatusCode::OK
                }
            }),
        );
        let client = client_for(serve(router).await);

        client.synthesize(&request()).await.unwrap();

        let body = received.lock().unwrap().clone().unwrap();
        assert_eq!(body["session_name"], "s_0123");
        assert_eq!(body["source_file"], "/wf/scripts/C1/s.txt");
        assert_eq!(body["speaker_voice"], "EN_Ivy_Female");
        assert_eq!(body["top_k"], 50);
        assert_eq!(body["enable_text_splitting"], true);
        assert_eq!(body["bitrate"], "312k");
    }

    #[tokio::test]
    async fn test_non_success_status_is_service_error() {
        let router = Router::new().route(
            "/process_with_pandrator",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "tts crashed") }),
        );
        let client = client_for(serve(router).await);

        match client.synthesize(&request()).await {
            Err(VoiceError::ServiceError(msg)) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("tts crashed"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr));
        let err = client.synthesize(&request()).await.unwrap_err();
        assert!(matches!(err, VoiceError::ConnectionFailed(_)));
    }
}
