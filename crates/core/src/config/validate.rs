use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Polling and relocation budgets are usable
/// - At least one worker and a non-empty script extension
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.video.max_poll_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "video.max_poll_attempts must be at least 1".to_string(),
        ));
    }

    if config.video.relocation_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "video.relocation_attempts must be at least 1".to_string(),
        ));
    }

    if config.coordinator.workers == 0 {
        return Err(ConfigError::ValidationError(
            "coordinator.workers must be at least 1".to_string(),
        ));
    }

    let extension = config.watcher.script_extension.trim_start_matches('.');
    if extension.is_empty() {
        return Err(ConfigError::ValidationError(
            "watcher.script_extension cannot be empty".to_string(),
        ));
    }

    if config.workspace.default_channel.is_empty() {
        return Err(ConfigError::ValidationError(
            "workspace.default_channel cannot be empty".to_string(),
        ));
    }

    Ok(())
}
