use std::sync::Arc;
use narrato_core::{Config, Coordinator, JobStore, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    job_store: Arc<dyn JobStore>,
    coordinator: Option<Arc<Coordinator>>,
}

impl AppState {
    pub fn new(
        config: Config,
        job_store: Arc<dyn JobStore>,
        coordinator: Option<Arc<Coordinator>>,
    ) -> Self {
        Self {
            config,
            job_store,
            coordinator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn job_store(&self) -> &dyn JobStore {
        self.job_store.as_ref()
    }

    /// The coordinator, unless disabled in config.
    pub fn coordinator(&self) -> Option<&Arc<Coordinator>> {
        self.coordinator.as_ref()
    }
}
