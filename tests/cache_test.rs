mod common;

use common::{MockAdapter, TaglessStore};
use db_pipeline::{
    AdapterRegistry, CacheDecision, CacheIdentity, CacheKeyProvider, CacheMiddleware, CacheStore,
    Call, ErrorKind, Executor, MemoryCacheStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn fixture() -> (
    Executor,
    Arc<MockAdapter>,
    Arc<CacheMiddleware>,
    Arc<MemoryCacheStore>,
) {
    let main = Arc::new(MockAdapter::new("main"));
    let store = Arc::new(MemoryCacheStore::new());
    let cache = Arc::new(CacheMiddleware::new(store.clone()));
    let registry = Arc::new(
        AdapterRegistry::builder()
            .register(main.clone())
            .build()
            .unwrap(),
    );
    let exec = Executor::builder(registry)
        .shared_middleware(cache.clone())
        .build();
    (exec, main, cache, store)
}

#[tokio::test]
async fn test_miss_populates_then_hit_skips_the_adapter() {
    let (exec, main, _, _) = fixture();

    let first = exec
        .query(Call::new("SELECT * FROM users").with(CacheIdentity::new("users:all")))
        .await
        .unwrap();
    assert_eq!(main.count("query"), 1);

    let second = exec
        .query(Call::new("SELECT * FROM users").with(CacheIdentity::new("users:all")))
        .await
        .unwrap();
    assert_eq!(main.count("query"), 1);
    assert_eq!(first.rows, second.rows);
    assert_eq!(second.rows[0]["connection"], json!("main"));
}

#[tokio::test]
async fn test_discard_resolver_skips_persistence() {
    let (exec, main, _, _) = fixture();

    let identity = || {
        CacheIdentity::new("users:all").with_resolver(|_, _| CacheDecision::Discard)
    };
    exec.query(Call::new("SELECT * FROM users").with(identity()))
        .await
        .unwrap();
    exec.query(Call::new("SELECT * FROM users").with(identity()))
        .await
        .unwrap();
    assert_eq!(main.count("query"), 2);
}

#[tokio::test]
async fn test_uncacheable_result_is_logic_error() {
    let main = Arc::new(MockAdapter::new("main").with_uncacheable_results());
    let store = Arc::new(MemoryCacheStore::new());
    let registry = Arc::new(
        AdapterRegistry::builder()
            .register(main.clone())
            .build()
            .unwrap(),
    );
    let exec = Executor::builder(registry)
        .middleware(CacheMiddleware::new(store))
        .build();

    let err = exec
        .query(Call::new("SELECT * FROM users").with(CacheIdentity::new("users:all")))
        .await
        .unwrap_err();
    assert!(err.is_logic());
}

#[tokio::test]
async fn test_statement_with_cache_identity_is_logic_error() {
    let (exec, main, _, _) = fixture();

    let err = exec
        .statement(Call::new("UPDATE t SET v = 1").with(CacheIdentity::new("t:v")))
        .await
        .unwrap_err();
    assert!(err.is_logic());
    assert_eq!(main.count("statement"), 0);
}

#[tokio::test]
async fn test_key_provider_derives_the_identity() {
    let (exec, _, _, store) = fixture();

    let provider = CacheKeyProvider::new(|source| CacheIdentity::new(format!("q:{source}")));
    exec.query(Call::new("SELECT 1").with(provider)).await.unwrap();
    assert!(store.get("q:SELECT 1").await.is_some());
}

#[tokio::test]
async fn test_invalidate_deletes_keys() {
    let (exec, main, cache, store) = fixture();

    exec.query(Call::new("SELECT * FROM users").with(CacheIdentity::new("users:all")))
        .await
        .unwrap();
    assert!(store.get("users:all").await.is_some());

    cache
        .invalidate(&["users:all".to_string()], &[])
        .await
        .unwrap();
    assert!(store.get("users:all").await.is_none());

    exec.query(Call::new("SELECT * FROM users").with(CacheIdentity::new("users:all")))
        .await
        .unwrap();
    assert_eq!(main.count("query"), 2);
}

#[tokio::test]
async fn test_tag_invalidation_sweeps_tagged_slots() {
    let (exec, main, cache, _) = fixture();

    let identity = || CacheIdentity::new("users:all").with_tag("users");
    exec.query(Call::new("SELECT * FROM users").with(identity()))
        .await
        .unwrap();

    cache
        .invalidate(&[], &["users".to_string()])
        .await
        .unwrap();
    exec.query(Call::new("SELECT * FROM users").with(identity()))
        .await
        .unwrap();
    assert_eq!(main.count("query"), 2);
}

#[tokio::test]
async fn test_tag_invalidation_needs_store_support() {
    let cache = CacheMiddleware::new(Arc::new(TaglessStore::default()));

    let err = cache
        .invalidate(&[], &["users".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[tokio::test]
async fn test_expired_slot_misses() {
    let (exec, main, _, _) = fixture();

    let identity = || CacheIdentity::new("users:all").with_ttl(Duration::ZERO);
    exec.query(Call::new("SELECT * FROM users").with(identity()))
        .await
        .unwrap();
    // zero TTL expires immediately; the next call goes back to the adapter
    exec.query(Call::new("SELECT * FROM users").with(identity()))
        .await
        .unwrap();
    assert_eq!(main.count("query"), 2);
}

#[tokio::test]
async fn test_query_without_identity_passes_through() {
    let (exec, main, _, _) = fixture();

    exec.query(Call::new("SELECT 1")).await.unwrap();
    exec.query(Call::new("SELECT 1")).await.unwrap();
    assert_eq!(main.count("query"), 2);
}
