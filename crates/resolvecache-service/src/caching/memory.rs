use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use sentry::{Hub, SentryFutureExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{CacheBuster, CacheEntry, CacheError, CacheKey, ResolverCacheConfig};
use crate::store::SharedStore;

type ComputationChannel = Shared<BoxFuture<'static, CacheEntry<Arc<Value>>>>;
type GenerationFetch = Shared<BoxFuture<'static, CacheEntry<CacheBuster>>>;

/// Per-call options of [`ResolverCache::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Overrides the configured default TTL for the persisted result.
    ///
    /// A zero duration is treated like `None`.
    pub ttl: Option<Duration>,
}

impl ResolveOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// What an instance knows about the current generation.
#[derive(Default)]
enum GenerationState {
    #[default]
    Unknown,
    /// A single fetch is in flight, every caller awaits it.
    Fetching(GenerationFetch),
    Known(CacheBuster),
}

impl fmt::Debug for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("Unknown"),
            Self::Fetching(_) => f.write_str("Fetching"),
            Self::Known(cache_buster) => f.debug_tuple("Known").field(cache_buster).finish(),
        }
    }
}

struct Inner {
    config: Arc<ResolverCacheConfig>,
    store: SharedStore,
    generation: Mutex<GenerationState>,
    /// Used for deduplicating computations, keyed by their fully-qualified key.
    ///
    /// Entries are never removed: a finished computation keeps answering with its value or
    /// error for as long as this instance lives.
    computations: Mutex<HashMap<String, ComputationChannel>>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let computations = self
            .computations
            .lock()
            .map_or(0, |computations| computations.len());
        f.debug_struct("Inner")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("generation", &self.generation)
            .field("computations", &computations)
            .finish()
    }
}

/// A request-scoped cache of resolver computations.
///
/// Every computation is identified by a [`CacheKey`] and runs at most once per instance. On top of
/// that, results are persisted in a shared [store](crate::store) under the current
/// [`CacheBuster`], so later instances can reuse them until they expire or the generation is
/// rotated.
///
/// Clones share all state, they belong to the same request.
#[derive(Debug, Clone)]
pub struct ResolverCache {
    inner: Arc<Inner>,
}

impl ResolverCache {
    pub fn new(config: Arc<ResolverCacheConfig>, store: SharedStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                generation: Mutex::default(),
                computations: Mutex::default(),
            }),
        }
    }

    pub fn config(&self) -> &ResolverCacheConfig {
        &self.inner.config
    }

    /// Returns the current generation, fetching it from the store on first use.
    ///
    /// Concurrent callers share a single fetch. A failed fetch is reported to all of them and
    /// retried by the next call.
    pub async fn generation(&self) -> CacheEntry<CacheBuster> {
        let fetch = {
            let mut state = self.lock_generation();
            match &*state {
                GenerationState::Known(cache_buster) => return Ok(cache_buster.clone()),
                GenerationState::Fetching(fetch) => fetch.clone(),
                GenerationState::Unknown => {
                    let store = Arc::clone(&self.inner.store);
                    let key_name = self.inner.config.cache_buster_key.clone();
                    let fetch = async move { CacheBuster::fetch(&*store, &key_name).await }
                        .boxed()
                        .shared();
                    *state = GenerationState::Fetching(fetch.clone());
                    fetch
                }
            }
        };

        let result = fetch.clone().await;

        let mut state = self.lock_generation();
        // Only the fetch that is still current may settle the state, `reset` may have won.
        if let GenerationState::Fetching(current) = &*state {
            if current.ptr_eq(&fetch) {
                *state = match &result {
                    Ok(cache_buster) => GenerationState::Known(cache_buster.clone()),
                    Err(_) => GenerationState::Unknown,
                };
            }
        }

        result
    }

    /// Rotates the generation in the store and switches this instance over to it.
    ///
    /// All previously persisted results become unreachable, for this and every later instance.
    pub async fn reset(&self) -> CacheEntry<CacheBuster> {
        let key_name = &self.inner.config.cache_buster_key;
        let cache_buster = CacheBuster::rotate(&*self.inner.store, key_name).await?;
        *self.lock_generation() = GenerationState::Known(cache_buster.clone());
        Ok(cache_buster)
    }

    /// Returns the result of `producer` for `key`, computing it at most once.
    ///
    /// The result is looked up in this instance first, then in the store. Only if both miss, the
    /// `producer` is invoked and its result is persisted with the effective TTL of `options`.
    /// Concurrent calls for the same key share one computation and observe the same value or
    /// error. Errors are never persisted.
    ///
    /// The computation is spawned on the current runtime, so it completes even if every caller
    /// stops waiting for it.
    pub async fn resolve<T, F, Fut>(
        &self,
        key: &CacheKey,
        producer: F,
        options: ResolveOptions,
    ) -> CacheEntry<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        metric!(counter("caches.access") += 1);

        let cache_buster = self.generation().await?;
        let scoped_key = cache_buster.scope(key);

        let channel = {
            let mut computations = self
                .inner
                .computations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let channel = match computations.entry(scoped_key) {
                Entry::Occupied(entry) => {
                    metric!(counter("caches.memory.hit") += 1);
                    entry.get().clone()
                }
                Entry::Vacant(entry) => {
                    let ttl = self.inner.config.effective_ttl(options.ttl);
                    let computation = lookup_or_compute::<T, _, _>(
                        Arc::clone(&self.inner.store),
                        entry.key().clone(),
                        producer,
                        ttl,
                    );
                    entry.insert(spawn_computation(computation)).clone()
                }
            };

            metric!(gauge("caches.memory.entries") = computations.len() as u64);
            channel
        };

        let value = channel.await?;
        T::deserialize(&*value).map_err(CacheError::from)
    }

    fn lock_generation(&self) -> std::sync::MutexGuard<'_, GenerationState> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawns the computation as a separate task and returns a channel every caller can await.
fn spawn_computation<F>(computation: F) -> ComputationChannel
where
    F: Future<Output = CacheEntry<Arc<Value>>> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();

    let task = async move {
        sender.send(computation.await).ok();
    }
    .bind_hub(Hub::new_from_top(Hub::current()));
    tokio::spawn(task);

    receiver
        .unwrap_or_else(|_cancelled| {
            tracing::error!("resolver computation was dropped before completing");
            Err(CacheError::InternalError)
        })
        .boxed()
        .shared()
}

/// Loads the value for `scoped_key` from the store, or computes and persists it.
async fn lookup_or_compute<T, F, Fut>(
    store: SharedStore,
    scoped_key: String,
    producer: F,
    ttl: Duration,
) -> CacheEntry<Arc<Value>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    if let Some(payload) = store.get(&scoped_key).await? {
        match parse_payload::<T>(&payload) {
            Ok(value) => {
                tracing::debug!(key = %scoped_key, "Loaded result from store");
                metric!(counter("caches.store.hit") += 1);
                return Ok(Arc::new(value));
            }
            Err(err) => {
                tracing::warn!(
                    key = %scoped_key,
                    error = &err as &dyn std::error::Error,
                    "Malformed payload in store, recomputing",
                );
                metric!(counter("caches.store.malformed") += 1);
            }
        }
    } else {
        tracing::debug!(key = %scoped_key, "No result in store");
        metric!(counter("caches.store.miss") += 1);
    }

    metric!(counter("caches.computation") += 1);
    let start = Instant::now();
    let value = match producer().await {
        Ok(item) => serde_json::to_value(&item)?,
        Err(err) => {
            metric!(counter("caches.computation.failed") += 1);
            tracing::debug!(key = %scoped_key, error = %format!("{err:#}"), "Computation failed");
            return Err(CacheError::computation(err));
        }
    };
    metric!(timer("caches.computation.duration") = start.elapsed());

    // e.g. a NaN serializes as `null`, which no later reader could turn back into `T`
    T::deserialize(&value)?;

    store
        .set(&scoped_key, &value.to_string(), Some(ttl))
        .await?;

    Ok(Arc::new(value))
}

/// Parses a stored payload, accepting it only if it is a valid `T`.
fn parse_payload<T: DeserializeOwned>(payload: &str) -> Result<Value, serde_json::Error> {
    let value: Value = serde_json::from_str(payload)?;
    T::deserialize(&value)?;
    Ok(value)
}
