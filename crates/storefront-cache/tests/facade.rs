//! Facade behaviour against the in-process remote store.
//!
//! Time-dependent tests run on a paused tokio clock, so "3601 seconds later"
//! costs nothing.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use storefront_cache::keys::{self, ProductListQuery};
use storefront_cache::{CacheMode, CacheService, MAX_TTL_SECS, MemoryStore};

fn tiered() -> (CacheService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheService::builder()
        .with_remote(store.clone())
        .with_fallback_capacity(1000)
        .build();
    (cache, store)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Pagination {
    page: u32,
    limit: u32,
    total_products: u64,
    total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProductPage {
    products: Vec<Value>,
    pagination: Pagination,
}

fn sample_page() -> ProductPage {
    ProductPage {
        products: (1..=12)
            .map(|i| json!({"id": i, "name": format!("Item {i}"), "price": i * 5}))
            .collect(),
        pagination: Pagination {
            page: 1,
            limit: 12,
            total_products: 40,
            total_pages: 4,
        },
    }
}

#[tokio::test]
async fn test_set_then_get_round_trips() {
    let (cache, _store) = tiered();
    let page = sample_page();

    cache.set("products:1", &page, 3600).await;
    let cached: Option<ProductPage> = cache.get("products:1").await;

    assert_eq!(cached, Some(page));
    assert_eq!(cache.stats().remote_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_entries_expire_after_ttl() {
    let (cache, _store) = tiered();
    cache.set("search:lamp:20", &json!({"results": []}), 1800).await;

    tokio::time::advance(Duration::from_secs(1799)).await;
    assert!(cache.get::<Value>("search:lamp:20").await.is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.get::<Value>("search:lamp:20").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fallback_entries_expire_while_remote_is_down() {
    let (cache, store) = tiered();
    store.set_unreachable(true);
    cache.set("product:9", &json!({"id": 9}), 60).await;

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(cache.get::<Value>("product:9").await.is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(cache.get::<Value>("product:9").await.is_none());
}

#[tokio::test]
async fn test_fallback_serves_when_remote_unreachable() {
    let (cache, store) = tiered();
    store.set_unreachable(true);

    cache.set("product:1", &json!({"id": 1, "name": "Desk"}), 7200).await;
    let cached: Option<Value> = cache.get("product:1").await;

    assert_eq!(cached, Some(json!({"id": 1, "name": "Desk"})));
    let stats = cache.stats();
    assert_eq!(stats.fallback_hits, 1);
    assert_eq!(stats.remote_hits, 0);
    assert!(stats.errors >= 2);
}

#[tokio::test]
async fn test_fallback_keeps_serving_after_outage_starts() {
    let (cache, store) = tiered();
    // Written while healthy: both tiers hold the value
    cache.set("analytics:categories", &json!([{"_id": "books"}]), 14400).await;

    store.set_unreachable(true);
    let cached: Option<Value> = cache.get("analytics:categories").await;
    assert_eq!(cached, Some(json!([{"_id": "books"}])));
}

#[tokio::test]
async fn test_remote_miss_is_authoritative() {
    let (cache, store) = tiered();

    // Only the fallback gets this value
    store.set_unreachable(true);
    cache.set("product:5", &json!({"stale": true}), 3600).await;

    // Remote back up and has no entry for the key
    store.set_unreachable(false);
    assert!(store.peek("product:5").is_none());
    assert!(cache.get::<Value>("product:5").await.is_none());
    assert_eq!(cache.stats().fallback_hits, 0);
}

#[tokio::test]
async fn test_remote_value_written_elsewhere_is_visible() {
    let (cache, store) = tiered();
    store.insert_raw("product:77", r#"{"id":77}"#, Duration::from_secs(60));

    let cached: Option<Value> = cache.get("product:77").await;
    assert_eq!(cached, Some(json!({"id": 77})));
}

#[tokio::test]
async fn test_delete_removes_from_both_tiers() {
    let (cache, store) = tiered();
    cache.set("wishlist:u1", &json!({"items": [1, 2]}), 3600).await;

    cache.delete("wishlist:u1").await;

    assert!(cache.get::<Value>("wishlist:u1").await.is_none());
    assert!(store.peek("wishlist:u1").is_none());

    // Nothing left in the fallback either
    store.set_unreachable(true);
    assert!(cache.get::<Value>("wishlist:u1").await.is_none());
}

#[tokio::test]
async fn test_clear_pattern_leaves_other_namespaces() {
    let (cache, store) = tiered();
    cache.set("products:1", &json!(1), 3600).await;
    cache.set("products:2", &json!(2), 3600).await;
    cache.set("orders:1", &json!(3), 3600).await;

    let outcome = cache.clear("products:*").await;
    assert_eq!(outcome.remote_removed, Some(2));
    assert_eq!(outcome.fallback_removed, 2);

    assert!(cache.get::<Value>("products:1").await.is_none());
    assert!(cache.get::<Value>("products:2").await.is_none());
    assert_eq!(cache.get::<Value>("orders:1").await, Some(json!(3)));

    // The fallback tier was cleared precisely too
    store.set_unreachable(true);
    assert_eq!(cache.get::<Value>("orders:1").await, Some(json!(3)));
    assert!(cache.get::<Value>("products:1").await.is_none());
}

#[tokio::test]
async fn test_clear_all() {
    let (cache, _store) = tiered();
    cache.set("a:1", &json!(1), 60).await;
    cache.set("b:1", &json!(2), 60).await;

    let outcome = cache.clear_all().await;
    assert_eq!(outcome.remote_removed, Some(2));
    assert_eq!(cache.stats().fallback.entries, 0);
}

#[tokio::test]
async fn test_clear_while_remote_down_still_clears_fallback() {
    let (cache, store) = tiered();
    cache.set("products:1", &json!(1), 3600).await;
    store.set_unreachable(true);

    let outcome = cache.clear("products:*").await;
    assert_eq!(outcome.remote_removed, None);
    assert_eq!(outcome.fallback_removed, 1);
}

#[tokio::test]
async fn test_every_operation_survives_a_dead_remote() {
    let (cache, store) = tiered();
    store.set_unreachable(true);

    for key in ["", "product:1", "products:*", "weird key with spaces", "🚀"] {
        cache.set(key, &json!({"k": key}), 60).await;
        let _ = cache.get::<Value>(key).await;
        cache.delete(key).await;
        let _ = cache.clear(key).await;
    }
    cache.clear_all().await;
    assert!(!cache.is_remote_available().await);
}

#[tokio::test]
async fn test_huge_ttl_does_not_panic() {
    let (cache, store) = tiered();

    cache.set("product:1", &json!({"id": 1}), u64::MAX).await;
    assert!(store.peek("product:1").is_some());

    store.set_unreachable(true);
    cache.set("product:2", &json!({"id": 2}), u64::MAX).await;
    assert_eq!(
        cache.get::<Value>("product:2").await,
        Some(json!({"id": 2}))
    );
}

#[tokio::test(start_paused = true)]
async fn test_huge_ttl_is_clamped_to_max() {
    let (cache, _store) = tiered();
    cache.set("product:1", &json!(1), u64::MAX).await;

    tokio::time::advance(Duration::from_secs(MAX_TTL_SECS - 1)).await;
    assert!(cache.get::<Value>("product:1").await.is_some());
    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(cache.get::<Value>("product:1").await.is_none());
}

#[tokio::test]
async fn test_corrupt_remote_payload_is_a_miss() {
    let (cache, store) = tiered();
    store.insert_raw("product:3", "{not json", Duration::from_secs(60));

    assert!(cache.get::<Value>("product:3").await.is_none());
    // The unparseable entry is dropped
    assert!(store.peek("product:3").is_none());
    let stats = cache.stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.remote_errors, 1);
}

#[tokio::test]
async fn test_type_mismatch_is_a_miss() {
    let (cache, _store) = tiered();
    cache.set("stats:products", &json!({"count": "many"}), 60).await;

    assert!(cache.get::<ProductPage>("stats:products").await.is_none());
}

#[tokio::test]
async fn test_unparseable_fallback_entry_is_charged_to_fallback() {
    let cache = CacheService::builder().build();
    cache.set("stats:products", &json!({"count": "many"}), 60).await;

    assert!(cache.get::<ProductPage>("stats:products").await.is_none());
    let stats = cache.stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.remote_errors, 0);
    assert_eq!(stats.fallback.entries, 0);
}

#[tokio::test]
async fn test_zero_ttl_is_not_cached() {
    let (cache, store) = tiered();
    cache.set("product:1", &json!(1), 0).await;

    assert!(store.peek("product:1").is_none());
    assert!(cache.get::<Value>("product:1").await.is_none());
}

#[tokio::test]
async fn test_set_default_uses_configured_ttl() {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheService::builder()
        .with_remote(store.clone())
        .with_default_ttl(120)
        .build();
    assert_eq!(cache.default_ttl_secs(), 120);

    cache.set_default("product:1", &json!(1)).await;
    assert_eq!(store.peek("product:1").as_deref(), Some("1"));
}

#[tokio::test]
async fn test_local_only_mode() {
    let cache = CacheService::builder().build();
    assert_eq!(cache.mode(), CacheMode::LocalOnly);

    cache.set("product:1", &json!({"id": 1}), 60).await;
    assert_eq!(cache.get::<Value>("product:1").await, Some(json!({"id": 1})));

    let outcome = cache.clear("product:*").await;
    assert_eq!(outcome.remote_removed, None);
    assert_eq!(outcome.fallback_removed, 1);
    assert_eq!(cache.stats().remote_backend, None);
}

#[tokio::test]
async fn test_get_or_load_reads_through() {
    let (cache, _store) = tiered();
    let mut origin_calls = 0;

    let first = cache
        .get_or_load("product:1", 60, || {
            origin_calls += 1;
            async { Ok::<_, std::io::Error>(json!({"id": 1})) }
        })
        .await
        .unwrap();
    assert!(!first.hit);

    let second = cache
        .get_or_load("product:1", 60, || async {
            Err::<Value, _>(std::io::Error::other("origin must not be queried"))
        })
        .await
        .unwrap();
    assert!(second.hit);
    assert_eq!(second.value, first.value);
    assert_eq!(origin_calls, 1);
}

#[tokio::test]
async fn test_get_or_load_does_not_cache_errors() {
    let (cache, store) = tiered();

    let result = cache
        .get_or_load("product:404", 60, || async {
            Err::<Value, _>("not found")
        })
        .await;
    assert_eq!(result.unwrap_err(), "not found");
    assert!(store.peek("product:404").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_product_listing_scenario() {
    let (cache, _store) = tiered();
    let query = ProductListQuery {
        page: 1,
        limit: 12,
        category: Some("electronics".into()),
        min_price: Some(0.0),
        max_price: Some(100.0),
        sort: "-createdAt".into(),
        search: None,
    };
    let key = keys::product_list(&query);
    assert_eq!(key, "products:1:12:electronics:0:100:-createdAt:");

    let origin_queries = std::cell::Cell::new(0u32);
    let load = || {
        origin_queries.set(origin_queries.get() + 1);
        async { Ok::<_, std::convert::Infallible>(sample_page()) }
    };

    let miss = cache.get_or_load(&key, 3600, load).await.unwrap();
    assert!(!miss.hit);

    tokio::time::advance(Duration::from_secs(3599)).await;
    let hit = cache.get_or_load(&key, 3600, load).await.unwrap();
    assert!(hit.hit);
    assert_eq!(hit.value.pagination.page, 1);
    assert_eq!(hit.value.products.len(), 12);

    tokio::time::advance(Duration::from_secs(2)).await;
    let refreshed = cache.get_or_load(&key, 3600, load).await.unwrap();
    assert!(!refreshed.hit);

    assert_eq!(origin_queries.get(), 2);
}
