//! Channel configuration: typed settings, backing sources and the
//! time-bounded cache the pipeline reads through.

mod cache;
mod source;
mod types;

pub use cache::{ConfigCache, DEFAULT_CACHE_TTL};
pub use source::{ChannelConfigError, ChannelConfigSource, JsonFileSource};
pub use types::{ChannelConfig, ChannelPaths, ResolvedChannelPaths, VideoSettings, VoiceSettings};
