use std::fmt;
use std::sync::Arc;

use super::{CacheEntry, CacheKey};
use crate::store::CacheStore;

/// The generation token all cache entries are scoped to.
///
/// Every fully-qualified key starts with the token that was current when the entry was written.
/// Rotating the token therefore invalidates the whole cache at once: old entries are never
/// addressed again and are left to expire through their TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheBuster(Arc<str>);

impl fmt::Display for CacheBuster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CacheBuster {
    /// Creates a new, hard-to-guess token from 20 random bytes.
    pub fn random() -> Self {
        let bytes: [u8; 20] = rand::random();
        Self(hex::encode(bytes).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the fully-qualified key for `key` under this generation.
    pub fn scope(&self, key: &CacheKey) -> String {
        format!("{}-{}", self.0, key)
    }

    /// Reads the current token from the store, creating one if there is none yet.
    pub async fn fetch(store: &dyn CacheStore, key_name: &str) -> CacheEntry<Self> {
        match store.get(key_name).await? {
            Some(token) if !token.is_empty() => {
                tracing::trace!(generation = %token, "Using stored cache generation");
                Ok(Self(token.into()))
            }
            _ => Self::rotate(store, key_name).await,
        }
    }

    /// Creates a new token and persists it as the current generation.
    ///
    /// The token is stored without TTL, as a bare string.
    pub async fn rotate(store: &dyn CacheStore, key_name: &str) -> CacheEntry<Self> {
        let cache_buster = Self::random();
        store.set(key_name, cache_buster.as_str(), None).await?;

        tracing::info!(
            generation = cache_buster.as_str(),
            key = key_name,
            "Rotated cache generation"
        );
        metric!(counter("caches.generation.rotated") += 1);
        Ok(cache_buster)
    }
}

impl From<String> for CacheBuster {
    fn from(token: String) -> Self {
        Self(token.into())
    }
}
