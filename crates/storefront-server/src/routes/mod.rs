//! REST handlers.
//!
//! Read handlers go through [`CacheService::get_or_load`]: the key comes from
//! `storefront_cache::keys`, a hit adds `"cached": true` to the body. Mutating
//! handlers commit to the catalog first, then schedule invalidation.
//!
//! [`CacheService::get_or_load`]: storefront_cache::CacheService::get_or_load

pub mod cache;
pub mod health;
pub mod products;
pub mod recommendations;
pub mod reviews;
pub mod search;
pub mod wishlist;

use axum::Json;
use serde::Serialize;
use serde_json::Value;
use storefront_cache::Lookup;

use crate::error::{ApiError, ApiResult};

/// Cache TTLs per endpoint, in seconds.
pub mod ttl {
    pub const PRODUCT_LIST: u64 = 3600;
    pub const PRODUCT: u64 = 7200;
    pub const CATEGORY_ANALYTICS: u64 = 14_400;
    pub const SEARCH: u64 = 1800;
    pub const TRENDING: u64 = 10_800;
    pub const TRENDING_CATEGORY: u64 = 7200;
    pub const RECOMMENDATIONS: u64 = 21_600;
    pub const SIMILAR: u64 = 14_400;
    pub const FREQUENTLY_BOUGHT: u64 = 18_000;
    pub const FEED: u64 = 10_800;
    pub const REVIEWS: u64 = 3600;
    pub const WISHLIST: u64 = 3600;
}

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

pub(crate) fn clamp_limit(limit: Option<u32>, default: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

/// Serialize a lookup result, marking cache hits.
pub(crate) fn respond<T: Serialize>(lookup: Lookup<T>) -> ApiResult<Json<Value>> {
    let mut body =
        serde_json::to_value(&lookup.value).map_err(|e| ApiError::Internal(e.to_string()))?;
    if lookup.hit {
        if let Value::Object(map) = &mut body {
            map.insert("cached".to_string(), Value::Bool(true));
        }
    }
    Ok(Json(body))
}
