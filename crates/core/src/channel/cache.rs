//! Time-bounded cache in front of a [`ChannelConfigSource`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use super::source::{ChannelConfigError, ChannelConfigSource};
use super::types::ChannelConfig;

/// Default freshness window of a cached entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

struct CachedEntry {
    config: Arc<ChannelConfig>,
    loaded_at: Instant,
}

/// Cache of channel configs keyed by channel name.
///
/// Lookups are read-shared. Reloads, for any channel, serialize on a single
/// lock, and a fresh entry found after taking that lock is returned without
/// touching the source again.
pub struct ConfigCache {
    source: Arc<dyn ChannelConfigSource>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedEntry>>,
    reload_lock: Mutex<()>,
}

impl ConfigCache {
    pub fn new(source: Arc<dyn ChannelConfigSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: RwLock::new(HashMap::new()),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn with_default_ttl(source: Arc<dyn ChannelConfigSource>) -> Self {
        Self::new(source, DEFAULT_CACHE_TTL)
    }

    /// Return the configuration of `channel`, reading the source only when
    /// no entry younger than the TTL exists.
    pub async fn get(&self, channel: &str) -> Result<Arc<ChannelConfig>, ChannelConfigError> {
        if let Some(config) = self.fresh(channel).await {
            return Ok(config);
        }

        let _reload = self.reload_lock.lock().await;

        // Another caller may have reloaded while we waited.
        if let Some(config) = self.fresh(channel).await {
            return Ok(config);
        }

        debug!("Loading config for channel {}", channel);
        let config = Arc::new(self.source.load(channel).await?);

        self.entries.write().await.insert(
            channel.to_string(),
            CachedEntry {
                config: Arc::clone(&config),
                loaded_at: Instant::now(),
            },
        );

        Ok(config)
    }

    /// Drop the cached entry for `channel`, forcing the next lookup to reload.
    pub async fn invalidate(&self, channel: &str) {
        self.entries.write().await.remove(channel);
    }

    /// Number of channels currently cached (fresh or not).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn fresh(&self, channel: &str) -> Option<Arc<ChannelConfig>> {
        let entries = self.entries.read().await;
        entries
            .get(channel)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.config))
    }
}
