//! Single handle over every resource jobs compete for.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::channel::{ChannelConfig, ConfigCache, ResolvedChannelPaths};
use crate::layout::WorkspaceLayout;

use super::error::ResourceError;
use super::overlay_pool::{OverlayPool, OverlayReservation};
use super::slot::{ExecutionSlot, SlotGuard, SlotStatus};

/// Bundles the execution slot, the overlay pools and the channel config
/// cache. Built once at startup and shared by handle.
pub struct ResourceCoordinator {
    layout: WorkspaceLayout,
    slot: ExecutionSlot,
    overlays: OverlayPool,
    configs: ConfigCache,
    fallback_to_default: bool,
}

impl ResourceCoordinator {
    pub fn new(layout: WorkspaceLayout, overlays: OverlayPool, configs: ConfigCache) -> Self {
        Self {
            layout,
            slot: ExecutionSlot::new(),
            overlays,
            configs,
            fallback_to_default: true,
        }
    }

    /// Whether a channel without a config file runs with the built-in defaults.
    pub fn with_default_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_default = enabled;
        self
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn slot(&self) -> &ExecutionSlot {
        &self.slot
    }

    pub fn slot_status(&self) -> SlotStatus {
        self.slot.status()
    }

    /// Block until the execution slot is free.
    pub async fn acquire_slot(&self, job_id: &str) -> Result<SlotGuard, ResourceError> {
        self.slot.acquire(job_id).await
    }

    /// Cached channel configuration, or the defaults when the channel has
    /// none and fallback is enabled.
    pub async fn channel_config(&self, channel: &str) -> Result<Arc<ChannelConfig>, ResourceError> {
        match self.configs.get(channel).await {
            Ok(config) => Ok(config),
            Err(e) if e.is_not_found() => {
                if self.fallback_to_default {
                    warn!("No config for channel {}, using defaults", channel);
                    Ok(Arc::new(ChannelConfig::default()))
                } else {
                    Err(ResourceError::ConfigMissing(channel.to_string()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn resolve_paths(&self, channel: &str, config: &ChannelConfig) -> ResolvedChannelPaths {
        config.paths.resolve(&self.layout, channel)
    }

    /// Pick the oldest overlay of the channel's pool.
    pub async fn acquire_next_overlay(
        &self,
        channel: &str,
        config: &ChannelConfig,
    ) -> Result<OverlayReservation, ResourceError> {
        let pool_dir = self.resolve_paths(channel, config).overlay2_dir;
        self.overlays.acquire_next(channel, &pool_dir).await
    }

    /// Durably move a reserved overlay to `destination`.
    pub async fn consume_overlay(
        &self,
        reservation: &OverlayReservation,
        destination: &Path,
    ) -> Result<PathBuf, ResourceError> {
        self.overlays.consume(reservation, destination).await
    }

    pub fn release_overlay(&self, reservation: OverlayReservation) {
        self.overlays.release(reservation);
    }

    pub async fn overlays_remaining(
        &self,
        channel: &str,
        config: &ChannelConfig,
    ) -> Result<usize, ResourceError> {
        let pool_dir = self.resolve_paths(channel, config).overlay2_dir;
        self.overlays.remaining(&pool_dir).await
    }

    /// Fail with every path that does not exist.
    pub fn validate_paths(&self, paths: &[&Path]) -> Result<(), ResourceError> {
        let missing: Vec<PathBuf> = paths
            .iter()
            .filter(|p| !p.exists())
            .map(|p| p.to_path_buf())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ResourceError::MissingFiles(missing))
        }
    }
}
