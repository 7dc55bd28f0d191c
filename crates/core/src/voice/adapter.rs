//! Voice stage: one synthesis session per script.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::channel::VoiceSettings;
use crate::config::Config;
use crate::layout::WorkspaceLayout;
use crate::metrics;
use crate::placer::{Placer, Relocation};

use super::client::{VoiceClient, VoiceRequest};
use super::error::VoiceError;

const AUDIO_ARTIFACT: &str = "final.wav";
const SUBTITLE_ARTIFACT: &str = "final.srt";

/// Where the voice artifacts of a session ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOutput {
    pub session: String,
    pub audio_path: PathBuf,
    pub subtitle_path: PathBuf,
}

pub struct VoiceAdapter {
    client: Arc<dyn VoiceClient>,
    placer: Arc<dyn Placer>,
    layout: WorkspaceLayout,
    session_root: PathBuf,
    xtts_server_url: String,
}

impl VoiceAdapter {
    pub fn new(
        client: Arc<dyn VoiceClient>,
        placer: Arc<dyn Placer>,
        layout: WorkspaceLayout,
        session_root: impl Into<PathBuf>,
        xtts_server_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            placer,
            layout,
            session_root: session_root.into(),
            xtts_server_url: xtts_server_url.into(),
        }
    }

    pub fn from_config(
        client: Arc<dyn VoiceClient>,
        placer: Arc<dyn Placer>,
        config: &Config,
    ) -> Self {
        Self::new(
            client,
            placer,
            WorkspaceLayout::new(&config.workspace.root),
            config.voice_session_root(),
            config.voice.xtts_server_url.clone(),
        )
    }

    /// Fresh session name: `{script stem}_{uuid}`.
    pub fn new_session(script_path: &Path) -> String {
        let stem = script_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "script".to_string());
        format!("{}_{}", stem, uuid::Uuid::new_v4().simple())
    }

    pub fn session_dir(&self, session: &str) -> PathBuf {
        self.session_root.join(session)
    }

    /// Synthesize `script_path` under `session` and move the resulting
    /// audio and subtitle into the asset directories.
    pub async fn synthesize(
        &self,
        script_path: &Path,
        channel: &str,
        settings: &VoiceSettings,
        session: &str,
    ) -> Result<VoiceOutput, VoiceError> {
        if !script_path.exists() {
            return Err(VoiceError::ScriptNotFound(script_path.to_path_buf()));
        }

        let request = VoiceRequest {
            source_file: script_path.to_string_lossy().to_string(),
            session_name: session.to_string(),
            xtts_server_url: self.xtts_server_url.clone(),
            settings: settings.clone(),
        };

        info!(
            channel = %channel,
            session = %session,
            voice = %settings.speaker_voice,
            "Requesting synthesis for {}",
            script_path.display()
        );

        let start = Instant::now();
        let result = self.client.synthesize(&request).await;
        let status = match &result {
            Ok(()) => "success",
            Err(e) => e.metric_status(),
        };
        metrics::EXTERNAL_REQUESTS
            .with_label_values(&["voice", "synthesize", status])
            .inc();
        if let Err(e) = result {
            warn!(session = %session, "Voice service failed: {}", e);
            return Err(e);
        }
        info!(
            session = %session,
            "Voice service finished in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        let session_dir = self.session_dir(session);
        let wav = session_dir.join(AUDIO_ARTIFACT);
        let srt = session_dir.join(SUBTITLE_ARTIFACT);
        for artifact in [&wav, &srt] {
            if !artifact.exists() {
                return Err(VoiceError::MissingArtifact {
                    path: artifact.clone(),
                });
            }
        }

        let audio = self
            .placer
            .relocate(&Relocation::new(
                &wav,
                self.layout.audio_dir().join(format!("{}.wav", session)),
            ))
            .await?;
        let subtitle = self
            .placer
            .relocate(&Relocation::new(
                &srt,
                self.layout.srt_dir().join(format!("{}.srt", session)),
            ))
            .await?;

        Ok(VoiceOutput {
            session: session.to_string(),
            audio_path: audio.destination,
            subtitle_path: subtitle.destination,
        })
    }
}
