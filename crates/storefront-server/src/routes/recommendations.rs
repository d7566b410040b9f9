use std::future::ready;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_cache::keys;

use super::products::LimitParams;
use super::{clamp_limit, respond, ttl};
use crate::catalog::Product;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
struct Recommendations {
    recommendations: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Similar {
    similar_products: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrequentlyBought {
    frequently_bought: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrendingInCategory {
    category: String,
    trending: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Feed {
    recommended: Vec<Product>,
    trending: Vec<Product>,
    new_arrivals: Vec<Product>,
}

/// `GET /api/recommendations/user/{user_id}`
pub async fn for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(params.limit, 10);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(
            &keys::user_recommendations(&user_id, limit),
            ttl::RECOMMENDATIONS,
            || {
                ready(Ok::<_, ApiError>(Recommendations {
                    recommendations: catalog.recommendations(&user_id, limit),
                }))
            },
        )
        .await?;
    respond(lookup)
}

/// `GET /api/recommendations/similar/{product_id}`
pub async fn similar(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(params.limit, 8);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(
            &keys::similar_products(&product_id, limit),
            ttl::SIMILAR,
            || {
                ready(
                    catalog
                        .similar(&product_id, limit)
                        .map(|similar_products| Similar { similar_products })
                        .ok_or_else(|| ApiError::not_found("Product not found")),
                )
            },
        )
        .await?;
    respond(lookup)
}

/// `GET /api/recommendations/frequently-bought/{product_id}`
pub async fn frequently_bought(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(params.limit, 5);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(
            &keys::frequently_bought(&product_id, limit),
            ttl::FREQUENTLY_BOUGHT,
            || {
                ready(
                    catalog
                        .frequently_bought(&product_id, limit)
                        .map(|frequently_bought| FrequentlyBought { frequently_bought })
                        .ok_or_else(|| ApiError::not_found("Product not found")),
                )
            },
        )
        .await?;
    respond(lookup)
}

/// `GET /api/recommendations/trending-in/{category}`
pub async fn trending_in_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(params.limit, 10);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(
            &keys::trending_category(&category, limit),
            ttl::TRENDING_CATEGORY,
            || {
                ready(Ok::<_, ApiError>(TrendingInCategory {
                    trending: catalog.trending(Some(&category), limit),
                    category: category.clone(),
                }))
            },
        )
        .await?;
    respond(lookup)
}

/// `GET /api/recommendations/feed/{user_id}`
pub async fn feed(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(params.limit, 10);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&keys::user_feed(&user_id, limit), ttl::FEED, || {
            ready(Ok::<_, ApiError>(Feed {
                recommended: catalog.recommendations(&user_id, limit),
                trending: catalog.trending(None, limit),
                new_arrivals: catalog.new_arrivals(limit),
            }))
        })
        .await?;
    respond(lookup)
}
