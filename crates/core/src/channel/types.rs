//! Per-channel configuration.
//!
//! Every field carries a serde default, so a channel file only needs to
//! name what differs from [`ChannelConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::layout::WorkspaceLayout;

/// Settings for one channel, as stored in `config/channels/{channel}.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub voice_settings: VoiceSettings,
    #[serde(default)]
    pub video_settings: VideoSettings,
    #[serde(default)]
    pub paths: ChannelPaths,
}

/// Speech synthesis parameters forwarded to the voice service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_speaker_voice")]
    pub speaker_voice: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_one")]
    pub length_penalty: f64,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_one")]
    pub speed: f64,
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: u32,
    #[serde(default = "default_true")]
    pub enable_text_splitting: bool,
    #[serde(default = "default_max_sentence_length")]
    pub max_sentence_length: u32,
    #[serde(default = "default_true")]
    pub enable_sentence_splitting: bool,
    #[serde(default = "default_true")]
    pub enable_sentence_appending: bool,
    #[serde(default)]
    pub remove_diacritics: bool,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
    /// Silence appended after each sentence, in milliseconds.
    #[serde(default = "default_silence")]
    pub appended_silence: u32,
    /// Silence between paragraphs, in milliseconds.
    #[serde(default = "default_silence")]
    pub paragraph_silence: u32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            speaker_voice: default_speaker_voice(),
            language: default_language(),
            temperature: default_temperature(),
            length_penalty: default_one(),
            repetition_penalty: default_repetition_penalty(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            speed: default_one(),
            stream_chunk_size: default_stream_chunk_size(),
            enable_text_splitting: true,
            max_sentence_length: default_max_sentence_length(),
            enable_sentence_splitting: true,
            enable_sentence_appending: true,
            remove_diacritics: false,
            output_format: default_output_format(),
            bitrate: default_bitrate(),
            appended_silence: default_silence(),
            paragraph_silence: default_silence(),
        }
    }
}

fn default_speaker_voice() -> String {
    "EN_Ivy_Female".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_temperature() -> f64 {
    0.75
}

fn default_one() -> f64 {
    1.0
}

fn default_repetition_penalty() -> f64 {
    5.0
}

fn default_top_k() -> u32 {
    50
}

fn default_top_p() -> f64 {
    0.85
}

fn default_stream_chunk_size() -> u32 {
    200
}

fn default_true() -> bool {
    true
}

fn default_max_sentence_length() -> u32 {
    100
}

fn default_output_format() -> String {
    "wav".to_string()
}

fn default_bitrate() -> String {
    "312k".to_string()
}

fn default_silence() -> u32 {
    200
}

/// Rendering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default = "default_preset_name")]
    pub preset_name: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            preset_name: default_preset_name(),
        }
    }
}

fn default_preset_name() -> String {
    "1".to_string()
}

/// Resource locations. Unset entries fall back to the standard layout;
/// relative entries resolve against the workspace root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPaths {
    /// Fixed overlay applied to every video of the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay1: Option<PathBuf>,
    /// Pool of single-use overlays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay2_dir: Option<PathBuf>,
    /// Final output directory; consumed overlays land here too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay2_used_dir: Option<PathBuf>,
}

/// Channel paths with defaults applied and the root resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChannelPaths {
    pub overlay1: PathBuf,
    pub overlay2_dir: PathBuf,
    pub final_dir: PathBuf,
}

impl ChannelPaths {
    pub fn resolve(&self, layout: &WorkspaceLayout, channel: &str) -> ResolvedChannelPaths {
        ResolvedChannelPaths {
            overlay1: self
                .overlay1
                .as_deref()
                .map(|p| layout.resolve(p))
                .unwrap_or_else(|| layout.overlay1_dir(channel).join("overlay1.png")),
            overlay2_dir: self
                .overlay2_dir
                .as_deref()
                .map(|p| layout.resolve(p))
                .unwrap_or_else(|| layout.overlay2_dir(channel)),
            final_dir: self
                .overlay2_used_dir
                .as_deref()
                .map(|p| layout.resolve(p))
                .unwrap_or_else(|| layout.final_dir(channel)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_voice_settings() {
        let voice = VoiceSettings::default();
        assert_eq!(voice.speaker_voice, "EN_Ivy_Female");
        assert_eq!(voice.temperature, 0.75);
        assert_eq!(voice.repetition_penalty, 5.0);
        assert_eq!(voice.top_k, 50);
        assert_eq!(voice.bitrate, "312k");
        assert!(!voice.remove_diacritics);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "voice_settings": { "speaker_voice": "EN_Bob", "speed": 1.2 },
            "video_settings": { "preset_name": "4" }
        }"#;
        let config: ChannelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.voice_settings.speaker_voice, "EN_Bob");
        assert_eq!(config.voice_settings.speed, 1.2);
        assert_eq!(config.voice_settings.language, "en");
        assert_eq!(config.video_settings.preset_name, "4");
        assert_eq!(config.paths, ChannelPaths::default());
    }

    #[test]
    fn test_resolve_paths_defaults_and_overrides() {
        let layout = WorkspaceLayout::new("/wf");

        let resolved = ChannelPaths::default().resolve(&layout, "C1");
        assert_eq!(
            resolved.overlay1,
            PathBuf::from("/wf/assets/overlay1/C1/overlay1.png")
        );
        assert_eq!(resolved.overlay2_dir, PathBuf::from("/wf/assets/overlay2/C1"));
        assert_eq!(resolved.final_dir, PathBuf::from("/wf/assets/final/C1"));

        let paths = ChannelPaths {
            overlay1: Some(PathBuf::from("branding/logo.png")),
            overlay2_dir: Some(PathBuf::from("/pool")),
            overlay2_used_dir: None,
        };
        let resolved = paths.resolve(&layout, "C1");
        assert_eq!(resolved.overlay1, PathBuf::from("/wf/branding/logo.png"));
        assert_eq!(resolved.overlay2_dir, PathBuf::from("/pool"));
    }
}
