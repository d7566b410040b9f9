//! Integration tests for the Redis tier.
//!
//! Tests use testcontainers to spin up a real Redis instance.
//!
//! Run with: cargo test -p storefront-cache --test redis_cache -- --ignored

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use storefront_cache::{
    CacheService, ConnectionState, ReconnectPolicy, RedisSettings, RedisStore, RemoteStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn connect(prefix_free_db: &str) -> RedisStore {
    let settings = RedisSettings {
        url: prefix_free_db.to_string(),
        pool_size: 5,
        operation_timeout: Duration::from_millis(5000),
        reconnect: ReconnectPolicy::default(),
        scan_count: 10,
    };
    RedisStore::connect(settings).await.expect("connect")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_connection() {
    let store = connect(&get_redis_url().await).await;
    assert_eq!(store.state(), ConnectionState::Connected);
    assert!(store.is_available().await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_get_set_delete() {
    let store = connect(&get_redis_url().await).await;

    store
        .set_with_expiry("it:product:1", 60, r#"{"id":1}"#)
        .await
        .unwrap();
    assert_eq!(
        store.get("it:product:1").await.unwrap().as_deref(),
        Some(r#"{"id":1}"#)
    );

    store.delete("it:product:1").await.unwrap();
    assert_eq!(store.get("it:product:1").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_native_ttl() {
    let store = connect(&get_redis_url().await).await;
    store.set_with_expiry("it:ttl", 1, "x").await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.get("it:ttl").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_scan_and_bulk_delete() {
    let store = connect(&get_redis_url().await).await;
    for i in 0..25 {
        store
            .set_with_expiry(&format!("it-scan:products:{i}"), 60, "x")
            .await
            .unwrap();
    }
    store
        .set_with_expiry("it-scan:orders:1", 60, "x")
        .await
        .unwrap();

    let keys = store.keys_matching("it-scan:products:*").await.unwrap();
    assert_eq!(keys.len(), 25);

    assert_eq!(store.delete_many(&keys).await.unwrap(), 25);
    assert!(store.keys_matching("it-scan:products:*").await.unwrap().is_empty());
    assert_eq!(store.get("it-scan:orders:1").await.unwrap().as_deref(), Some("x"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_facade_over_redis() {
    let store = Arc::new(connect(&get_redis_url().await).await);
    let cache = CacheService::builder().with_remote(store.clone()).build();

    cache.set("it-facade:products:1", &json!({"page": 1}), 60).await;
    cache.set("it-facade:orders:1", &json!({"id": 1}), 60).await;
    assert_eq!(
        cache.get::<Value>("it-facade:products:1").await,
        Some(json!({"page": 1}))
    );

    let outcome = cache.clear("it-facade:products:*").await;
    assert_eq!(outcome.remote_removed, Some(1));
    assert!(cache.get::<Value>("it-facade:products:1").await.is_none());
    assert!(cache.get::<Value>("it-facade:orders:1").await.is_some());
}
