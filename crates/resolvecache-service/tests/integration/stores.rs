use std::time::Duration;

use resolvecache_service::config::Config;
use resolvecache_service::{CacheError, CacheKey, ResolveOptions, ResolverCacheService};
use resolvecache_test::{CountingStore, FailingStore, StoreHits};
use serde_json::json;

use crate::utils::{Resolvers, service};

#[tokio::test]
async fn test_single_generation_fetch() {
    resolvecache_test::setup();
    let store = CountingStore::new();
    let service = service(store.clone());
    let cache = service.request_cache();

    let keys: Vec<_> = (0..5).map(|i| CacheKey::from_items(&json!([i]))).collect();
    let results = futures::future::join_all(keys.iter().enumerate().map(|(i, key)| {
        cache.resolve(key, move || async move { anyhow::Ok(i) }, ResolveOptions::default())
    }))
    .await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), i);
    }

    // one generation lookup and bootstrap, one lookup and write per key
    assert_eq!(
        store.hits(),
        StoreHits {
            get: 6,
            set: 6,
            delete: 0,
        }
    );
}

#[tokio::test]
async fn test_memoized_results_skip_the_store() {
    resolvecache_test::setup();
    let store = CountingStore::new();
    let service = service(store.clone());
    let cache = service.request_cache();
    let key = CacheKey::from_items(&json!(["A", 1]));

    for _ in 0..3 {
        let value: u32 = cache
            .resolve(&key, || async { anyhow::Ok(1) }, ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    assert_eq!(store.hits().get, 2);
    assert_eq!(store.hits().set, 2);
}

#[tokio::test]
async fn test_failing_store() {
    resolvecache_test::setup();
    let service = service(FailingStore::new());
    let resolvers = Resolvers::new(None);

    let err = resolvers.query_as(&service).await.unwrap_err();
    assert!(matches!(err, CacheError::Store(_)));
    assert_eq!(resolvers.calls(), 0);

    // a failed generation fetch is retried by the next request
    let err = service.request_cache().generation().await.unwrap_err();
    assert_eq!(err.to_string(), "cache store failed");
}

#[tokio::test]
async fn test_filesystem_store_is_shared() {
    resolvecache_test::setup();
    let store_dir = resolvecache_test::tempdir();

    let yaml = format!(
        "cache:\n  default_ttl: 1h\nstore:\n  filesystem:\n    path: {}\n",
        store_dir.path().display()
    );
    let config = Config::from_reader(yaml.as_bytes()).unwrap();

    // two services on the same directory, like two processes on one machine
    let first = ResolverCacheService::from_config(&config).unwrap();
    let second = ResolverCacheService::from_config(&config).unwrap();
    let resolvers = Resolvers::new(Some(Duration::from_secs(60)));

    let res_first = resolvers.query_as(&first).await.unwrap();
    resolvers.set_mul(2);
    let res_second = resolvers.query_as(&second).await.unwrap();
    assert_eq!(res_first, res_second);
    assert_eq!(resolvers.calls(), 6);

    second.invalidate().await.unwrap();
    let res_third = resolvers.query_as(&first).await.unwrap();
    assert_eq!(res_third["As"][0], json!({ "prop1": 4, "prop2": "4" }));
    assert_eq!(resolvers.calls(), 12);
}

#[tokio::test]
async fn test_store_with_timeout() {
    resolvecache_test::setup();
    let store_dir = resolvecache_test::tempdir();

    let yaml = format!(
        "store:\n  timeout: 5s\n  filesystem:\n    path: {}\n",
        store_dir.path().display()
    );
    let config = Config::from_reader(yaml.as_bytes()).unwrap();
    let service = ResolverCacheService::from_config(&config).unwrap();

    let value: String = service
        .request_cache()
        .resolve(
            &CacheKey::from_items(&json!(["timeout"])),
            || async { anyhow::Ok("fast enough".to_owned()) },
            ResolveOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(value, "fast enough");
}
