#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod resolver;
pub mod service;
pub mod store;

pub use caching::{
    CacheBuster, CacheEntry, CacheError, CacheKey, CacheKeyBuilder, ResolveOptions, ResolverCache,
};
pub use resolver::{CachedResolver, ResolveInfo, ResolverContext, with_caching};
pub use service::ResolverCacheService;
pub use store::{CacheStore, SharedStore, StoreError};
