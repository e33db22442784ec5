//! The persistent key-value store backing the cross-request cache.
//!
//! The engine only needs three operations from a store: `get`, `set` with an optional
//! time-to-live, and `delete`. Stores are shared between all request-scoped engine instances and
//! must tolerate concurrent access to the same key themselves; the engine does no locking over
//! the store and the last write wins.
//!
//! Two backends are provided: [`InMemoryStore`] for single-process deployments and tests, and
//! [`FilesystemStore`] which persists entries in a directory and can be shared between processes
//! on the same machine. Any backend can be wrapped in a [`TimeoutStore`] to bound its latency.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod config;
mod fs;
mod memory;

pub use config::{StoreBackendConfig, StoreConfig};
pub use fs::FilesystemStore;
pub use memory::InMemoryStore;

/// Errors using a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store did not answer in time.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    /// An I/O error, for example in the filesystem backend.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Any other backend failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The contract of a persistent cache store.
#[async_trait]
pub trait CacheStore: fmt::Debug + Send + Sync {
    /// Returns the value stored under `key`, or `None` if it is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`.
    ///
    /// A `ttl` of `None` keeps the entry until it is overwritten or deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// A store shared between the service and all request-scoped caches.
pub type SharedStore = Arc<dyn CacheStore>;

/// Creates the store described by `config`.
pub fn from_config(config: &StoreConfig) -> io::Result<SharedStore> {
    let store: SharedStore = match &config.backend {
        StoreBackendConfig::Memory(_) => Arc::new(InMemoryStore::new()),
        StoreBackendConfig::Filesystem(cfg) => Arc::new(FilesystemStore::new(&cfg.path)?),
    };

    Ok(match config.timeout {
        Some(timeout) => Arc::new(TimeoutStore::new(store, timeout)),
        None => store,
    })
}

/// A store wrapper that bounds every operation of the inner store with a timeout.
#[derive(Debug)]
pub struct TimeoutStore {
    inner: SharedStore,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: SharedStore, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, future: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_elapsed) => {
                metric!(counter("caches.store.timeout") += 1, "operation" => operation);
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl CacheStore for TimeoutStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_timeout("get", self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.with_timeout("set", self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_timeout("delete", self.inner.delete(key)).await
    }
}
