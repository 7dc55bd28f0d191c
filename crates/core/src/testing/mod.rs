//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the two external services so whole jobs can run
//! against a temporary workspace.
//!
//! # Example
//!
//! ```rust,ignore
//! use narrato_core::testing::{fixtures, MockVideoClient, MockVoiceClient};
//!
//! let config = fixtures::test_config(temp.path());
//! fixtures::seed_overlays(temp.path(), "C1", &["a.png"]);
//!
//! let voice = MockVoiceClient::new(config.voice_session_root());
//! let video = MockVideoClient::new(config.video_output_dir());
//! ```

mod mock_video_client;
mod mock_voice_client;

pub use mock_video_client::MockVideoClient;
pub use mock_voice_client::MockVoiceClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::channel::ChannelConfig;
    use crate::config::Config;
    use crate::layout::WorkspaceLayout;

    /// Configuration rooted at `root` with timings shrunk for tests:
    /// no settle delay, 10 ms polling with a budget of 5, no relocation
    /// backoff.
    pub fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.workspace.root = root.to_path_buf();
        config.database.path = root.join("narrato.db");
        config.watcher.settle_delay_ms = 0;
        config.video.poll_interval_ms = 10;
        config.video.max_poll_attempts = 5;
        config.video.relocation_backoff_ms = 0;
        config
    }

    /// Write a script into a channel directory.
    pub fn write_script(root: &Path, channel: &str, name: &str, body: &str) -> PathBuf {
        let dir = WorkspaceLayout::new(root).channel_dir(channel);
        std::fs::create_dir_all(&dir).expect("create channel dir");
        let path = dir.join(name);
        std::fs::write(&path, body).expect("write script");
        path
    }

    /// Create the channel's fixed overlay and fill its pool with `pool`.
    pub fn seed_overlays(root: &Path, channel: &str, pool: &[&str]) {
        let layout = WorkspaceLayout::new(root);

        let overlay1 = layout.overlay1_dir(channel);
        std::fs::create_dir_all(&overlay1).expect("create overlay1 dir");
        std::fs::write(overlay1.join("overlay1.png"), b"fixed overlay").expect("write overlay1");

        let overlay2 = layout.overlay2_dir(channel);
        std::fs::create_dir_all(&overlay2).expect("create overlay2 dir");
        for name in pool {
            std::fs::write(overlay2.join(name), b"pooled overlay").expect("write overlay2");
        }
    }

    /// Write `config/{channel}.json`.
    pub fn write_channel_config(root: &Path, channel: &str, config: &ChannelConfig) {
        let path = WorkspaceLayout::new(root).channel_config_path(channel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create config dir");
        }
        let json = serde_json::to_string_pretty(config).expect("serialize channel config");
        std::fs::write(path, json).expect("write channel config");
    }
}
