//! Caching of individual field resolvers.
//!
//! A field resolver is a function `(parent, args, context, info) -> Future<Result<T>>`, as called
//! by a query executor for every field it resolves. [`with_caching`] turns such a function into
//! one that goes through the request's [`ResolverCache`] first:
//!
//! ```
//! use resolvecache_service::{ResolveInfo, ResolverCache, ResolverContext, with_caching};
//! use serde_json::json;
//!
//! struct Context {
//!     cache: ResolverCache,
//! }
//!
//! impl ResolverContext for Context {
//!     fn resolver_cache(&self) -> &ResolverCache {
//!         &self.cache
//!     }
//! }
//!
//! let doubled = with_caching(
//!     |parent: u32, _args: (), _context: std::sync::Arc<Context>, _info: ResolveInfo| async move {
//!         anyhow::Ok(parent * 2)
//!     },
//!     |parent: &u32, _args: &(), _context: &std::sync::Arc<Context>| json!(parent),
//! );
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::caching::{CacheEntry, CacheKey, ResolveOptions, ResolverCache};

/// Describes the field that is being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveInfo {
    /// The name of the type owning the field.
    pub parent_type: String,
    /// The name of the field.
    pub field_name: String,
}

impl ResolveInfo {
    pub fn new(parent_type: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            parent_type: parent_type.into(),
            field_name: field_name.into(),
        }
    }
}

/// Gives access to the cache of the current request.
pub trait ResolverContext {
    fn resolver_cache(&self) -> &ResolverCache;
}

impl<C: ResolverContext + ?Sized> ResolverContext for Arc<C> {
    fn resolver_cache(&self) -> &ResolverCache {
        (**self).resolver_cache()
    }
}

impl ResolverContext for ResolverCache {
    fn resolver_cache(&self) -> &ResolverCache {
        self
    }
}

/// Wraps the field resolver `resolve` so that its results are cached.
///
/// `cache_key_items` computes the arguments-dependent part of the key from the parent, the
/// arguments and the context. It is combined with the type and field name from [`ResolveInfo`],
/// so distinct fields never share results.
pub fn with_caching<R, K>(resolve: R, cache_key_items: K) -> CachedResolver<R, K> {
    CachedResolver {
        resolve: Arc::new(resolve),
        cache_key_items,
        ttl: None,
    }
}

/// A field resolver whose results are cached, created with [`with_caching`].
pub struct CachedResolver<R, K> {
    resolve: Arc<R>,
    cache_key_items: K,
    ttl: Option<Duration>,
}

impl<R, K> fmt::Debug for CachedResolver<R, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedResolver")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<R, K> CachedResolver<R, K> {
    /// Persists results for `ttl` instead of the configured default.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Builds the cache key for one invocation.
    pub fn cache_key<P, A, C>(
        &self,
        parent: &P,
        args: &A,
        context: &C,
        info: &ResolveInfo,
    ) -> CacheKey
    where
        K: Fn(&P, &A, &C) -> Value,
    {
        let items = (self.cache_key_items)(parent, args, context);
        CacheKey::for_field(&info.parent_type, &info.field_name, &items)
    }

    /// Resolves the field, using the cache of `context`.
    ///
    /// The wrapped resolver only runs if the result is neither known to the request nor
    /// persisted in the store.
    pub fn call<P, A, C, T, Fut>(
        &self,
        parent: P,
        args: A,
        context: C,
        info: ResolveInfo,
    ) -> BoxFuture<'static, CacheEntry<T>>
    where
        R: Fn(P, A, C, ResolveInfo) -> Fut + Send + Sync + 'static,
        K: Fn(&P, &A, &C) -> Value,
        P: Send + 'static,
        A: Send + 'static,
        C: ResolverContext + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let key = self.cache_key(&parent, &args, &context, &info);
        let cache = context.resolver_cache().clone();
        let resolve = Arc::clone(&self.resolve);
        let options = ResolveOptions { ttl: self.ttl };

        async move {
            let producer = move || resolve(parent, args, context, info);
            cache.resolve(&key, producer, options).await
        }
        .boxed()
    }

    /// Turns this into a plain function with the signature of a field resolver.
    pub fn into_field_fn<P, A, C, T, Fut>(
        self,
    ) -> impl Fn(P, A, C, ResolveInfo) -> BoxFuture<'static, CacheEntry<T>> + Send + Sync + 'static
    where
        R: Fn(P, A, C, ResolveInfo) -> Fut + Send + Sync + 'static,
        K: Fn(&P, &A, &C) -> Value + Send + Sync + 'static,
        P: Send + 'static,
        A: Send + 'static,
        C: ResolverContext + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        move |parent, args, context, info| self.call(parent, args, context, info)
    }
}
