//! # Resolver caching infrastructure
//!
//! Resolving a query can hit the same expensive computation many times, both within a single
//! request and across requests. This module deduplicates and persists those computations.
//!
//! ## Cache Layers
//!
//! There are two layers:
//!
//! - An in-memory layer owned by one [`ResolverCache`] instance, which lives as long as one
//!   request. It collapses concurrent and repeated accesses to the same key into one computation,
//!   and remembers its outcome, errors included.
//! - A persistent layer backed by a [store](crate::store) shared between all requests. It holds
//!   serialized results with a time-to-live. Errors are never persisted.
//!
//! A cache request goes through the following steps:
//! - First, it resolves the current [`CacheBuster`] and derives the fully-qualified key.
//! - It then goes through the in-memory layer.
//! - On miss, it will try to load the result from the store.
//! - On miss, it will finally run the computation and write the result to the store.
//!
//! ## Generations
//!
//! Every fully-qualified key is prefixed with a random generation token that itself lives in the
//! store, under [`ResolverCacheConfig::cache_buster_key`]. Rotating that token, either through
//! [`ResolverCache::reset`] or by simply deleting it from the store, invalidates every persisted
//! result at once. Stale entries are not cleaned up, they are left to expire.
//!
//! ### Metrics
//!
//! We collect a couple of metrics:
//!
//! - `caches.access`: All accesses.
//! - `caches.memory.hit`: Accesses served by the in-memory layer.
//! - `caches.store.hit`: Accesses served by the store.
//! - `caches.store.miss`: Accesses that found nothing in the store.
//! - `caches.store.malformed`: Stored payloads that could not be read and were recomputed.
//! - `caches.computation`: Actual computations being run.
//! - `caches.computation.failed`: Computations that returned an error.
//! - `caches.generation.rotated`: New generation tokens written to the store.

mod cache_error;
mod cache_key;
mod config;
mod generation;
mod memory;

pub use cache_error::{CacheEntry, CacheError};
pub use cache_key::{CacheKey, CacheKeyBuilder};
pub use config::ResolverCacheConfig;
pub use generation::CacheBuster;
pub use memory::{ResolveOptions, ResolverCache};
