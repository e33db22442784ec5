//! Helpers for testing the resolver cache.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test. Assign it to a variable in the test function
//!    (e.g. `let _store_dir = test::tempdir()`).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use resolvecache_service::store::InMemoryStore;
use resolvecache_service::{CacheStore, SharedStore, StoreError};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `resolvecache_service` crate and
///    mutes all other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("resolvecache_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped, unless
/// [`keep`](TempDir::keep) is called. Use it as a guard to automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// A snapshot of the operations a [`CountingStore`] has seen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreHits {
    pub get: usize,
    pub set: usize,
    pub delete: usize,
}

/// A store that counts all operations before forwarding them to an inner store.
#[derive(Debug)]
pub struct CountingStore {
    inner: SharedStore,
    get: AtomicUsize,
    set: AtomicUsize,
    delete: AtomicUsize,
}

impl CountingStore {
    /// Creates a counting store backed by a fresh [`InMemoryStore`].
    pub fn new() -> Arc<Self> {
        Self::wrap(Arc::new(InMemoryStore::new()))
    }

    pub fn wrap(inner: SharedStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            get: AtomicUsize::new(0),
            set: AtomicUsize::new(0),
            delete: AtomicUsize::new(0),
        })
    }

    pub fn hits(&self) -> StoreHits {
        StoreHits {
            get: self.get.load(Ordering::Relaxed),
            set: self.set.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get.fetch_add(1, Ordering::Relaxed);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.set.fetch_add(1, Ordering::Relaxed);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delete.fetch_add(1, Ordering::Relaxed);
        self.inner.delete(key).await
    }
}

/// A store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingStore;

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(anyhow::anyhow!("store unavailable").into())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
        Err(anyhow::anyhow!("store unavailable").into())
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(anyhow::anyhow!("store unavailable").into())
    }
}
