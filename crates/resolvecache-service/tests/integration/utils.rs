use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::{self, BoxFuture};
use resolvecache_service::caching::ResolverCacheConfig;
use resolvecache_service::{
    CacheEntry, CacheError, ResolveInfo, ResolverCache, ResolverCacheService, ResolverContext,
    SharedStore, with_caching,
};
use serde_json::{Value, json};

/// The per-request context handed to every resolver.
pub struct Context {
    cache: ResolverCache,
}

impl ResolverContext for Context {
    fn resolver_cache(&self) -> &ResolverCache {
        &self.cache
    }
}

type FieldFn<T> = Box<
    dyn Fn(u32, (), Arc<Context>, ResolveInfo) -> BoxFuture<'static, CacheEntry<T>> + Send + Sync,
>;

/// The resolvers of type `A`, computing `prop1 = 2 * i * mul` and `prop2 = "{2 * i * mul}"`.
///
/// `mul` is an uncached external dependency, which tests change between queries to tell
/// cached from fresh results.
pub struct Resolvers {
    mul: Arc<AtomicU32>,
    calls: Arc<AtomicUsize>,
    prop1: FieldFn<u32>,
    prop2: FieldFn<String>,
}

impl Resolvers {
    pub fn new(ttl: Option<Duration>) -> Self {
        let mul = Arc::new(AtomicU32::new(1));
        let calls = Arc::new(AtomicUsize::new(0));

        let prop1 = {
            let (mul, calls) = (Arc::clone(&mul), Arc::clone(&calls));
            with_caching(
                move |i: u32, _: (), _: Arc<Context>, _: ResolveInfo| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let mul = mul.load(Ordering::SeqCst);
                    async move { anyhow::Ok(2 * i * mul) }
                },
                |i: &u32, _: &(), _: &Arc<Context>| json!(i),
            )
        };
        let prop2 = {
            let (mul, calls) = (Arc::clone(&mul), Arc::clone(&calls));
            with_caching(
                move |i: u32, _: (), _: Arc<Context>, _: ResolveInfo| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let mul = mul.load(Ordering::SeqCst);
                    async move { anyhow::Ok((2 * i * mul).to_string()) }
                },
                |i: &u32, _: &(), _: &Arc<Context>| json!(i),
            )
        };

        let (prop1, prop2) = match ttl {
            Some(ttl) => (prop1.ttl(ttl), prop2.ttl(ttl)),
            None => (prop1, prop2),
        };

        Self {
            mul,
            calls,
            prop1: Box::new(prop1.into_field_fn()),
            prop2: Box::new(prop2.into_field_fn()),
        }
    }

    pub fn set_mul(&self, mul: u32) {
        self.mul.store(mul, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn resolve_a(
        &self,
        context: &Arc<Context>,
        i: u32,
        with_prop2: bool,
    ) -> CacheEntry<Value> {
        let prop1 = (self.prop1)(i, (), Arc::clone(context), ResolveInfo::new("A", "prop1"));
        if !with_prop2 {
            return Ok(json!({ "prop1": prop1.await? }));
        }

        let prop2 = (self.prop2)(i, (), Arc::clone(context), ResolveInfo::new("A", "prop2"));
        let (prop1, prop2) = future::try_join(prop1, prop2).await?;
        Ok(json!({ "prop1": prop1, "prop2": prop2 }))
    }

    async fn resolve_list(
        &self,
        context: &Arc<Context>,
        ids: &[u32],
        with_prop2: bool,
    ) -> CacheEntry<Value> {
        let items = ids.iter().map(|&i| self.resolve_a(context, i, with_prop2));
        Ok(Value::Array(future::try_join_all(items).await?))
    }

    /// Runs `query { As { prop1 prop2 } }` in a new request, where `As` are `[1, 2, 3]`.
    pub async fn query_as(&self, service: &ResolverCacheService) -> CacheEntry<Value> {
        let context = Arc::new(Context {
            cache: service.request_cache(),
        });
        let list = self.resolve_list(&context, &[1, 2, 3], true).await?;
        Ok(json!({ "As": list }))
    }

    /// Runs `query { As { prop1 } Bs { As { prop1 } } }` in a new request, where `As` are
    /// `[1, 2, 3]` and `Bs` are `[{ As: [1, 2] }, { As: [3] }]`.
    pub async fn query_as_and_bs(&self, service: &ResolverCacheService) -> CacheEntry<Value> {
        let context = Arc::new(Context {
            cache: service.request_cache(),
        });

        let as_ = self.resolve_list(&context, &[1, 2, 3], false);
        let bs = async {
            let first = self.resolve_list(&context, &[1, 2], false);
            let second = self.resolve_list(&context, &[3], false);
            let (first, second) = future::try_join(first, second).await?;
            Ok::<_, CacheError>(json!([{ "As": first }, { "As": second }]))
        };

        let (as_, bs) = future::try_join(as_, bs).await?;
        Ok(json!({ "As": as_, "Bs": bs }))
    }
}

/// Creates a service with a default TTL of 100 seconds on top of `store`.
pub fn service(store: SharedStore) -> ResolverCacheService {
    let config = ResolverCacheConfig {
        default_ttl: Duration::from_secs(100),
        ..Default::default()
    };
    ResolverCacheService::new(config, store)
}
