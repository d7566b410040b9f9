pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod server;

use std::sync::Arc;

use storefront_cache::{CacheService, RedisStore};

pub use catalog::Catalog;
pub use config::{AppConfig, CacheConfig, LoggingConfig, RedisConfig, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use middleware::{CacheInvalidator, ResponseCache, invalidate_on_success, response_cache};
pub use observability::init_tracing;
pub use server::{AppState, ServerBuilder, StorefrontServer, build_app, router};

/// Create the cache service based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: local-only cache (in-process fallback tier)
/// - **Redis enabled**: Redis with the in-process tier as fallback
///
/// ## Graceful Degradation
///
/// An unreachable Redis server does not stop startup: the store reconnects in
/// the background and reads are served from the fallback tier meanwhile.
pub async fn create_cache_service(config: &AppConfig) -> CacheService {
    let builder = CacheService::builder()
        .with_fallback_capacity(config.cache.local_cache_max_entries)
        .with_default_ttl(config.cache.default_ttl_secs);

    if !config.redis.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return builder.build();
    }

    match RedisStore::connect(config.redis.settings()).await {
        Ok(store) => builder.with_remote(Arc::new(store)).build(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            builder.build()
        }
    }
}
