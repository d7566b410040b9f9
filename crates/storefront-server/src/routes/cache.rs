//! Cache administration.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use storefront_cache::Mutation;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    pub pattern: Option<String>,
}

/// `GET /api/cache/stats`
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.cache.stats();
    let remote_available = state.cache.is_remote_available().await;
    Json(json!({
        "mode": stats.mode.to_string(),
        "remoteBackend": stats.remote_backend,
        "remoteAvailable": remote_available,
        "remoteHits": stats.remote_hits,
        "fallbackHits": stats.fallback_hits,
        "misses": stats.misses,
        "errors": stats.errors,
        "remoteErrors": stats.remote_errors,
        "hitRate": stats.hit_rate(),
        "fallback": {
            "entries": stats.fallback.entries,
            "capacity": stats.fallback.capacity,
            "hits": stats.fallback.hits,
            "misses": stats.fallback.misses,
            "expirations": stats.fallback.expirations,
            "evictions": stats.fallback.evictions,
        },
    }))
}

/// `DELETE /api/cache?pattern=`, defaulting to every key.
///
/// Runs inline so the caller sees how many entries were removed.
pub async fn clear(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> ApiResult<Json<Value>> {
    let pattern = params.pattern.unwrap_or_else(|| "*".to_string());
    if pattern.is_empty() {
        return Err(ApiError::bad_request("pattern must not be empty"));
    }

    let report = state
        .invalidator
        .invalidate_now(Mutation::Pattern(pattern.clone()))
        .await;
    tracing::info!(
        pattern = %pattern,
        remote_removed = ?report.remote_removed,
        fallback_removed = report.fallback_removed,
        "cache cleared"
    );
    Ok(Json(json!({
        "pattern": pattern,
        "remoteRemoved": report.remote_removed,
        "fallbackRemoved": report.fallback_removed,
    })))
}
