use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub voice: VoiceServiceConfig,
    #[serde(default)]
    pub video: VideoServiceConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8001
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("narrato.db")
}

/// Where the `scripts/`, `assets/` and `config/` trees live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Channel created on startup when `scripts/` holds no channel yet.
    #[serde(default = "default_channel")]
    pub default_channel: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            default_channel: default_channel(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_channel() -> String {
    "C1".to_string()
}

/// Voice (speech synthesis) service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoiceServiceConfig {
    #[serde(default = "default_voice_url")]
    pub url: String,
    /// XTTS backend the voice service should talk to.
    #[serde(default = "default_xtts_url")]
    pub xtts_server_url: String,
    /// Directory where the service leaves per-session output.
    /// Relative paths resolve against the workspace root.
    #[serde(default = "default_session_root")]
    pub session_root: PathBuf,
    #[serde(default = "default_voice_timeout")]
    pub timeout_secs: u64,
}

impl Default for VoiceServiceConfig {
    fn default() -> Self {
        Self {
            url: default_voice_url(),
            xtts_server_url: default_xtts_url(),
            session_root: default_session_root(),
            timeout_secs: default_voice_timeout(),
        }
    }
}

fn default_voice_url() -> String {
    "http://localhost:5003".to_string()
}

fn default_xtts_url() -> String {
    "http://localhost:8020".to_string()
}

fn default_session_root() -> PathBuf {
    PathBuf::from("Pandrator/Pandrator/sessions")
}

fn default_voice_timeout() -> u64 {
    1800 // 30 minutes
}

/// Video (rendering) service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoServiceConfig {
    #[serde(default = "default_video_url")]
    pub url: String,
    /// Where the service writes rendered files, keyed by output name.
    /// Relative paths resolve against the workspace root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Timeout of a single submit or status request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Attempts for each post-render relocation.
    #[serde(default = "default_relocation_attempts")]
    pub relocation_attempts: u32,
    #[serde(default = "default_relocation_backoff")]
    pub relocation_backoff_ms: u64,
}

impl Default for VideoServiceConfig {
    fn default() -> Self {
        Self {
            url: default_video_url(),
            output_dir: default_output_dir(),
            request_timeout_secs: default_request_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
            relocation_attempts: default_relocation_attempts(),
            relocation_backoff_ms: default_relocation_backoff(),
        }
    }
}

fn default_video_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("final")
}

fn default_request_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    10_000 // 10 seconds
}

fn default_max_poll_attempts() -> u32 {
    180 // 30 minutes at the default interval
}

fn default_relocation_attempts() -> u32 {
    2
}

fn default_relocation_backoff() -> u64 {
    3000 // 3 seconds
}

/// Ingestion watcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatcherConfig {
    /// Extension (without dot) of files treated as scripts.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    /// Delay between detection and dispatch, lets writers finish.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Enqueue scripts already sitting in channel directories at startup.
    #[serde(default = "default_true")]
    pub scan_existing: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            script_extension: default_script_extension(),
            settle_delay_ms: default_settle_delay(),
            queue_capacity: default_queue_capacity(),
            scan_existing: true,
        }
    }
}

fn default_script_extension() -> String {
    "txt".to_string()
}

fn default_settle_delay() -> u64 {
    1000 // 1 second
}

fn default_queue_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

/// Pipeline coordinator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinatorConfig {
    /// When disabled, the server only exposes the job API.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Workers pulling jobs off the dispatch queue. Only one of them
    /// can hold the execution slot at a time.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_cache_ttl")]
    pub config_cache_ttl_secs: u64,
    /// Use the built-in channel defaults when a channel has no config file.
    #[serde(default = "default_true")]
    pub fallback_to_default_channel_config: bool,
    /// Extensions (without dot) accepted from the overlay pool.
    #[serde(default = "default_overlay_extensions")]
    pub overlay_extensions: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: default_workers(),
            config_cache_ttl_secs: default_cache_ttl(),
            fallback_to_default_channel_config: true,
            overlay_extensions: default_overlay_extensions(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_overlay_extensions() -> Vec<String> {
    vec!["png".to_string()]
}

impl Config {
    /// Resolve a possibly relative path against the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.root.join(path)
        }
    }

    /// Absolute-or-root-relative voice session directory.
    pub fn voice_session_root(&self) -> PathBuf {
        self.resolve(&self.voice.session_root)
    }

    /// Absolute-or-root-relative render output directory.
    pub fn video_output_dir(&self) -> PathBuf {
        self.resolve(&self.video.output_dir)
    }
}

/// Config view for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub workspace: WorkspaceConfig,
    pub voice: SanitizedServiceConfig,
    pub video: SanitizedServiceConfig,
    pub watcher: WatcherConfig,
    pub coordinator: CoordinatorConfig,
}

/// External service endpoint with the URL reduced to scheme and host.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServiceConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// Drop userinfo and query strings from a service URL.
fn redact_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, url),
    };
    let host = rest.split(['/', '?']).next().unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or(host);
    match scheme {
        Some(scheme) => format!("{}://{}", scheme, host),
        None => host.to_string(),
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            workspace: config.workspace.clone(),
            voice: SanitizedServiceConfig {
                url: redact_url(&config.voice.url),
                timeout_secs: config.voice.timeout_secs,
            },
            video: SanitizedServiceConfig {
                url: redact_url(&config.video.url),
                timeout_secs: config.video.request_timeout_secs,
            },
            watcher: config.watcher.clone(),
            coordinator: config.coordinator.clone(),
        }
    }
}
