use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{CacheStore, StoreError};

/// An item saved in the [`InMemoryStore`].
#[derive(Debug, Clone)]
struct StoredItem {
    value: String,
    /// When this item expires, if ever.
    ///
    /// This uses the tokio clock so that a paused runtime can advance it in tests.
    deadline: Option<Instant>,
}

impl StoredItem {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// A process-local store that keeps all entries in memory.
///
/// Expired entries read as absent and are evicted lazily, when they are accessed.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<String, StoredItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries that have not yet expired.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.values().filter(|item| !item.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        match items.get(key) {
            Some(item) if !item.is_expired(now) => return Ok(Some(item.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        tracing::trace!(key, "Evicting expired item from memory store");
        items.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let item = StoredItem {
            value: value.to_owned(),
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        };
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_owned(), item);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}
