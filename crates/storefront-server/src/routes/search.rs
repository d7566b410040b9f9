use std::future::ready;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_cache::keys::{self, AdvancedSearchQuery};

use super::{clamp_limit, respond, ttl};
use crate::catalog::{FilterOptions, Product, ProductStats};
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedParams {
    pub query: Option<String>,
    pub categories: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<AdvancedParams> for AdvancedSearchQuery {
    fn from(p: AdvancedParams) -> Self {
        let defaults = AdvancedSearchQuery::default();
        Self {
            query: p.query.filter(|q| !q.is_empty()),
            categories: p.categories.filter(|c| !c.is_empty()),
            min_price: p.min_price,
            max_price: p.max_price,
            min_rating: p.min_rating,
            sort_by: p.sort_by.filter(|s| !s.is_empty()).unwrap_or(defaults.sort_by),
            page: p.page.unwrap_or(defaults.page).max(1),
            limit: clamp_limit(p.limit, defaults.limit),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SearchResults {
    results: Vec<Product>,
}

/// `GET /api/search?query=&limit=`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let query = params.query.unwrap_or_default();
    if query.trim().chars().count() < 2 {
        return Err(ApiError::bad_request(
            "Search query must be at least 2 characters",
        ));
    }
    let limit = clamp_limit(params.limit, 20);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&keys::search(&query, limit), ttl::SEARCH, || {
            ready(Ok::<_, ApiError>(SearchResults {
                results: catalog.search(&query, limit),
            }))
        })
        .await?;
    respond(lookup)
}

/// `GET /api/search/advanced`
pub async fn advanced_search(
    State(state): State<AppState>,
    Query(params): Query<AdvancedParams>,
) -> ApiResult<Json<Value>> {
    let query = AdvancedSearchQuery::from(params);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&keys::advanced_search(&query), ttl::SEARCH, || {
            ready(Ok::<_, ApiError>(catalog.advanced_search(&query)))
        })
        .await?;
    respond(lookup)
}

/// `GET /api/search/filters`, cached whole by the response-cache middleware.
pub async fn filter_options(State(state): State<AppState>) -> Json<FilterOptions> {
    Json(state.catalog.filter_options())
}

/// `GET /api/search/stats`, cached whole by the response-cache middleware.
pub async fn product_stats(State(state): State<AppState>) -> Json<ProductStats> {
    Json(state.catalog.product_stats())
}
