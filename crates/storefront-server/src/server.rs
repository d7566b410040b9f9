use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    handler::Handler,
    middleware,
    routing::{delete, get},
};
use storefront_cache::{CacheService, Invalidator};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::middleware::{
    self as app_middleware, CacheInvalidator, ResponseCache, invalidate_on_success,
    response_cache,
};
use crate::routes::{cache, health, products, recommendations, reviews, search, wishlist};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheService,
    pub invalidator: Invalidator,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(cache: CacheService, catalog: Arc<Catalog>) -> Self {
        Self {
            invalidator: Invalidator::new(cache.clone()),
            cache,
            catalog,
        }
    }
}

/// URL fragment shared by every route behind the response cache.
const RESPONSE_CACHED_PREFIX: &str = "/api/search";

/// Build the application from configuration: connects the cache, seeds the
/// catalog and starts the fallback sweeper.
pub async fn build_app(cfg: &AppConfig) -> Router {
    crate::metrics::init_metrics();

    let cache = crate::create_cache_service(cfg).await;
    if cfg.cache.sweep_interval_secs > 0 {
        cache.spawn_fallback_sweeper(Duration::from_secs(cfg.cache.sweep_interval_secs));
    }

    router(AppState::new(cache, Arc::new(Catalog::seeded())), cfg)
}

/// Routes and middleware over an existing state.
pub fn router(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    let cached = middleware::from_fn_with_state(
        ResponseCache::new(state.cache.clone(), cfg.cache.response_ttl_secs)
            .with_max_body_bytes(cfg.cache.max_cached_body_bytes),
        response_cache,
    );
    // Catalog and review mutations change what the cached search responses show
    let invalidates = middleware::from_fn_with_state(
        CacheInvalidator::new(state.invalidator.clone(), RESPONSE_CACHED_PREFIX),
        invalidate_on_success,
    );

    Router::new()
        // Health and metrics
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        // Products
        .route(
            "/api/products",
            get(products::list_products)
                .post(products::create_product.layer(invalidates.clone())),
        )
        .route(
            "/api/products/analytics/categories",
            get(products::category_analytics),
        )
        .route("/api/products/trending", get(products::trending_products))
        .route(
            "/api/products/{id}",
            get(products::get_product)
                .put(products::update_product.layer(invalidates.clone()))
                .delete(products::delete_product.layer(invalidates.clone())),
        )
        // Search
        .route("/api/search", get(search::search))
        .route("/api/search/advanced", get(search::advanced_search))
        .route(
            "/api/search/filters",
            get(search::filter_options.layer(cached.clone())),
        )
        .route(
            "/api/search/stats",
            get(search::product_stats.layer(cached)),
        )
        // Recommendations
        .route(
            "/api/recommendations/user/{user_id}",
            get(recommendations::for_user),
        )
        .route(
            "/api/recommendations/similar/{product_id}",
            get(recommendations::similar),
        )
        .route(
            "/api/recommendations/frequently-bought/{product_id}",
            get(recommendations::frequently_bought),
        )
        .route(
            "/api/recommendations/trending-in/{category}",
            get(recommendations::trending_in_category),
        )
        .route(
            "/api/recommendations/feed/{user_id}",
            get(recommendations::feed),
        )
        // Reviews
        .route(
            "/api/reviews/product/{product_id}",
            get(reviews::product_reviews).post(reviews::create_review.layer(invalidates.clone())),
        )
        .route(
            "/api/reviews/{review_id}",
            delete(reviews::delete_review.layer(invalidates)),
        )
        // Wishlist
        .route("/api/wishlist/{user_id}", get(wishlist::get_wishlist))
        .route(
            "/api/wishlist/{user_id}/{product_id}",
            axum::routing::post(wishlist::add_item).delete(wishlist::remove_item),
        )
        // Cache administration
        .route("/api/cache/stats", get(cache::stats))
        .route("/api/cache", delete(cache::clear))
        .route_layer(middleware::from_fn(app_middleware::track_metrics))
        .with_state(state)
        // Middleware stack (outermost last: request id -> trace -> compression/cors -> body limit)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
}

pub struct StorefrontServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> StorefrontServer {
        let app = build_app(&self.config).await;

        StorefrontServer {
            addr: self.addr,
            app,
        }
    }
}

impl StorefrontServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
