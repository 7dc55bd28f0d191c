pub mod channel;
pub mod config;
pub mod coordinator;
pub mod job;
pub mod layout;
pub mod metrics;
pub mod pipeline;
pub mod placer;
pub mod resources;
pub mod testing;
pub mod video;
pub mod voice;
pub mod watcher;

pub use channel::{ChannelConfig, ConfigCache, JsonFileSource};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use coordinator::{Coordinator, CoordinatorError, CoordinatorSettings, CoordinatorStatus};
pub use job::{
    ErrorStage, JobError, JobFilter, JobStatus, JobStore, JobUpdate, NewJob, ScriptJob,
    SqliteJobStore,
};
pub use layout::WorkspaceLayout;
pub use pipeline::{PipelineController, PipelineError};
pub use video::{RenderServiceClient, VideoAdapter, VideoClient};
pub use voice::{PandratorClient, VoiceAdapter, VoiceClient};
