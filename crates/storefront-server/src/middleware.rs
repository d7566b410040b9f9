use std::time::Instant;

use axum::{
    Json,
    body::{Body, HttpBody},
    extract::{MatchedPath, OriginalUri, Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use storefront_cache::{CacheService, Invalidator, keys};
use uuid::Uuid;

use crate::metrics;

/// Response header reporting whether the response cache served the request.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Responses larger than this are not cached unless configured otherwise.
pub const DEFAULT_MAX_CACHED_BODY_BYTES: usize = 512 * 1024;

// =============================================================================
// Response Cache
// =============================================================================

/// Whole-response cache for GET routes, keyed by `GET:{path?query}`.
#[derive(Clone, Debug)]
pub struct ResponseCache {
    cache: CacheService,
    ttl_secs: u64,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(cache: CacheService, ttl_secs: u64) -> Self {
        Self {
            cache,
            ttl_secs,
            max_body_bytes: DEFAULT_MAX_CACHED_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Serve cached JSON for GET requests and cache successful JSON responses.
///
/// - non-GET or `noCache=true`: handler runs, no cache I/O
/// - hit: cached body, `X-Cache: HIT`, handler skipped
/// - miss: handler runs; a 2xx JSON body within the size limit is written to
///   the cache in the background and marked `X-Cache: MISS`
pub async fn response_cache(
    State(rc): State<ResponseCache>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::GET || bypass_requested(req.uri()) {
        return next.run(req).await;
    }

    // Nested routers strip their prefix from `req.uri()`; key on the full URL
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let key = keys::response(
        Method::GET.as_str(),
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
    );

    if let Some(cached) = rc.cache.get::<Value>(&key).await {
        tracing::debug!(key = %key, "response cache hit");
        let mut res = Json(cached).into_response();
        res.headers_mut().insert(X_CACHE, HeaderValue::from_static("HIT"));
        return res;
    }

    let res = next.run(req).await;
    if !res.status().is_success() || !is_json(&res) {
        return res;
    }

    let (mut parts, body) = res.into_parts();
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= rc.max_body_bytes as u64);
    if !fits {
        return Response::from_parts(parts, body);
    }

    // The handler's body stream is consumed either way; a read failure here
    // means the handler produced no usable response.
    let bytes = match axum::body::to_bytes(body, rc.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                key = %key,
                status = parts.status.as_u16(),
                error = %e,
                "failed to read handler response body"
            );
            return unreadable_body();
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => {
            let cache = rc.cache.clone();
            let ttl = rc.ttl_secs;
            tokio::spawn(async move {
                cache.set(&key, &value, ttl).await;
            });
            parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
        }
        Err(e) => {
            tracing::debug!(key = %key, error = %e, "response is not valid JSON, not caching");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn unreadable_body() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "message": "response body could not be read" })),
    )
        .into_response()
}

fn bypass_requested(uri: &Uri) -> bool {
    uri.query()
        .is_some_and(|q| q.split('&').any(|pair| pair == "noCache=true"))
}

fn is_json(res: &Response) -> bool {
    res.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

// =============================================================================
// Cache Invalidation
// =============================================================================

/// Clears response-cache entries whose URL contains `pattern` after a
/// successful mutation.
#[derive(Clone, Debug)]
pub struct CacheInvalidator {
    invalidator: Invalidator,
    pattern: String,
}

impl CacheInvalidator {
    pub fn new(invalidator: Invalidator, pattern: impl Into<String>) -> Self {
        Self {
            invalidator,
            pattern: pattern.into(),
        }
    }

    /// Key patterns cleared after a successful mutation.
    ///
    /// Only cached GET responses under the configured URL fragment are
    /// cleared. There is no blanket sweep of every `/products`, `/orders` or
    /// `/admin` response; the namespaced keys that handlers cache are cleared
    /// by the matching [`Mutation`](storefront_cache::Mutation) instead.
    pub fn patterns(&self) -> Vec<String> {
        vec![keys::response(Method::GET.as_str(), &format!("*{}*", self.pattern))]
    }
}

/// Schedule response-cache invalidation after a 2xx response to a mutation.
pub async fn invalidate_on_success(
    State(ci): State<CacheInvalidator>,
    req: Request,
    next: Next,
) -> Response {
    let mutation = !matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    let res = next.run(req).await;
    if mutation && res.status().is_success() {
        ci.invalidator.schedule_patterns("response", ci.patterns());
    }
    res
}

// =============================================================================
// Other Middleware
// =============================================================================

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // Preserve an incoming request id, otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("unknown"));

    // Available to downstream layers (e.g., the trace span)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

/// Record request count and latency per matched route.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let res = next.run(req).await;
    metrics::record_http_request(method.as_str(), &route, res.status().as_u16(), start.elapsed());
    res
}
