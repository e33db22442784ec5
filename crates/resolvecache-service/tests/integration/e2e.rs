use std::sync::Arc;
use std::time::Duration;

use resolvecache_service::CacheStore;
use resolvecache_service::store::InMemoryStore;
use serde_json::json;

use crate::utils::{Resolvers, service};

#[tokio::test]
async fn test_empty_cache() {
    resolvecache_test::setup();
    let service = service(Arc::new(InMemoryStore::new()));
    let resolvers = Resolvers::new(None);
    resolvers.set_mul(1);

    let res = resolvers.query_as(&service).await.unwrap();

    insta::assert_json_snapshot!(res, @r#"
    {
      "As": [
        {
          "prop1": 2,
          "prop2": "2"
        },
        {
          "prop1": 4,
          "prop2": "4"
        },
        {
          "prop1": 6,
          "prop2": "6"
        }
      ]
    }
    "#);
    assert_eq!(resolvers.calls(), 6);
}

#[tokio::test]
async fn test_cache_hit() {
    resolvecache_test::setup();
    let service = service(Arc::new(InMemoryStore::new()));
    let resolvers = Resolvers::new(None);

    let first = resolvers.query_as(&service).await.unwrap();
    resolvers.set_mul(2);
    let second = resolvers.query_as(&service).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(resolvers.calls(), 6);
}

#[tokio::test]
async fn test_caching_within_query() {
    resolvecache_test::setup();
    let service = service(Arc::new(InMemoryStore::new()));
    let resolvers = Resolvers::new(None);

    let res = resolvers.query_as_and_bs(&service).await.unwrap();

    assert_eq!(
        res,
        json!({
            "As": [{ "prop1": 2 }, { "prop1": 4 }, { "prop1": 6 }],
            "Bs": [
                { "As": [{ "prop1": 2 }, { "prop1": 4 }] },
                { "As": [{ "prop1": 6 }] },
            ],
        })
    );
    assert_eq!(resolvers.calls(), 3);
}

#[tokio::test]
async fn test_cache_miss_after_deleting_cache_buster() {
    resolvecache_test::setup();
    let store = Arc::new(InMemoryStore::new());
    let service = service(store.clone());
    let resolvers = Resolvers::new(None);

    resolvers.query_as(&service).await.unwrap();
    resolvers.set_mul(2);

    store.delete("cacheBuster").await.unwrap();

    let res = resolvers.query_as(&service).await.unwrap();
    assert_eq!(
        res,
        json!({
            "As": [
                { "prop1": 4, "prop2": "4" },
                { "prop1": 8, "prop2": "8" },
                { "prop1": 12, "prop2": "12" },
            ]
        })
    );
    assert_eq!(resolvers.calls(), 12);
}

#[tokio::test]
async fn test_cache_miss_after_invalidate() {
    resolvecache_test::setup();
    let service = service(Arc::new(InMemoryStore::new()));
    let resolvers = Resolvers::new(None);

    resolvers.query_as(&service).await.unwrap();
    resolvers.set_mul(2);
    service.invalidate().await.unwrap();

    let res = resolvers.query_as(&service).await.unwrap();
    assert_eq!(res["As"][2], json!({ "prop1": 12, "prop2": "12" }));
    assert_eq!(resolvers.calls(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_cache_miss_after_default_ttl() {
    resolvecache_test::setup();
    let service = service(Arc::new(InMemoryStore::new()));
    let resolvers = Resolvers::new(None);

    resolvers.query_as(&service).await.unwrap();
    resolvers.set_mul(2);

    tokio::time::advance(Duration::from_secs(101)).await;

    let res = resolvers.query_as(&service).await.unwrap();
    assert_eq!(
        res,
        json!({
            "As": [
                { "prop1": 4, "prop2": "4" },
                { "prop1": 8, "prop2": "8" },
                { "prop1": 12, "prop2": "12" },
            ]
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_with_ttl_override() {
    resolvecache_test::setup();
    let service = service(Arc::new(InMemoryStore::new()));
    let resolvers = Resolvers::new(Some(Duration::from_secs(200)));

    let first = resolvers.query_as(&service).await.unwrap();
    resolvers.set_mul(2);

    tokio::time::advance(Duration::from_secs(101)).await;

    let second = resolvers.query_as(&service).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(resolvers.calls(), 6);
}
