use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of the resolver cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverCacheConfig {
    /// The time-to-live of persisted results, unless a call overrides it.
    ///
    /// Defaults to `5m`.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// The store key holding the current generation token.
    ///
    /// Defaults to `cacheBuster`.
    pub cache_buster_key: String,
}

impl Default for ResolverCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            cache_buster_key: "cacheBuster".into(),
        }
    }
}

impl ResolverCacheConfig {
    /// Returns the TTL to persist a result with.
    ///
    /// A missing or zero `ttl` falls back to [`default_ttl`](Self::default_ttl).
    pub fn effective_ttl(&self, ttl: Option<Duration>) -> Duration {
        ttl.filter(|ttl| !ttl.is_zero()).unwrap_or(self.default_ttl)
    }
}
