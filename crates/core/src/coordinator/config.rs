//! Coordinator settings.

use std::time::Duration;

use crate::config::Config;

/// Runtime settings for the coordinator, drawn from the `[workspace]`,
/// `[watcher]` and `[coordinator]` sections.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Channel created when `scripts/` holds none.
    pub default_channel: String,
    pub script_extension: String,
    /// Delay between detection and dispatch.
    pub settle_delay: Duration,
    /// Capacity of the event and job queues.
    pub queue_capacity: usize,
    pub scan_existing: bool,
    pub workers: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_channel: config.workspace.default_channel.clone(),
            script_extension: config.watcher.script_extension.clone(),
            settle_delay: Duration::from_millis(config.watcher.settle_delay_ms),
            queue_capacity: config.watcher.queue_capacity.max(1),
            scan_existing: config.watcher.scan_existing,
            workers: config.coordinator.workers.max(1),
        }
    }
}
