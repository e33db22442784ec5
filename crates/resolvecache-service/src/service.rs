use std::sync::Arc;

use anyhow::{Context, Result};

use crate::caching::{CacheBuster, CacheEntry, ResolverCache, ResolverCacheConfig};
use crate::config::Config;
use crate::store::{self, SharedStore};

/// The process-wide entry point to the resolver cache.
///
/// The service owns the configuration and the shared store. It hands out one [`ResolverCache`]
/// per request via [`request_cache`](Self::request_cache), and can invalidate all persisted
/// results at once.
#[derive(Debug, Clone)]
pub struct ResolverCacheService {
    config: Arc<ResolverCacheConfig>,
    store: SharedStore,
}

impl ResolverCacheService {
    pub fn new(config: ResolverCacheConfig, store: SharedStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Creates the service and its store from the full configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = store::from_config(&config.store).context("failed to create cache store")?;
        Ok(Self::new(config.cache.clone(), store))
    }

    /// Creates a fresh cache for one request.
    ///
    /// Instances do not share in-memory state, only the persistent store.
    pub fn request_cache(&self) -> ResolverCache {
        ResolverCache::new(Arc::clone(&self.config), Arc::clone(&self.store))
    }

    /// Rotates the cache generation, making all persisted results unreachable.
    ///
    /// Request caches that already know the previous generation keep using it.
    pub async fn invalidate(&self) -> CacheEntry<CacheBuster> {
        CacheBuster::rotate(&*self.store, &self.config.cache_buster_key).await
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &ResolverCacheConfig {
        &self.config
    }
}
