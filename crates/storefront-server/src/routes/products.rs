use std::future::ready;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use storefront_cache::Mutation;
use storefront_cache::keys::{self, ProductListQuery};

use super::{clamp_limit, respond, ttl};
use crate::catalog::{CategorySummary, NewProduct, Product, ProductPatch};
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: Option<String>,
    pub search: Option<String>,
}

impl From<ListParams> for ProductListQuery {
    fn from(p: ListParams) -> Self {
        let defaults = ProductListQuery::default();
        Self {
            page: p.page.unwrap_or(defaults.page).max(1),
            limit: clamp_limit(p.limit, defaults.limit),
            category: p.category.filter(|c| !c.is_empty()),
            min_price: p.min_price,
            max_price: p.max_price,
            sort: p.sort.filter(|s| !s.is_empty()).unwrap_or(defaults.sort),
            search: p.search.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Analytics {
    categories: Vec<CategorySummary>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Trending {
    trending_products: Vec<Product>,
}

/// `GET /api/products`
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let query = ProductListQuery::from(params);
    let key = keys::product_list(&query);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&key, ttl::PRODUCT_LIST, || {
            ready(Ok::<_, ApiError>(catalog.list_products(&query)))
        })
        .await?;
    respond(lookup)
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&keys::product(&id), ttl::PRODUCT, || {
            ready(
                catalog
                    .product(&id)
                    .ok_or_else(|| ApiError::not_found("Product not found")),
            )
        })
        .await?;
    respond(lookup)
}

/// `GET /api/products/analytics/categories`
pub async fn category_analytics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&keys::category_analytics(), ttl::CATEGORY_ANALYTICS, || {
            ready(Ok::<_, ApiError>(Analytics {
                categories: catalog.category_analytics(),
            }))
        })
        .await?;
    respond(lookup)
}

/// `GET /api/products/trending`
pub async fn trending_products(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(params.limit, 10);
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&keys::trending_products(limit), ttl::TRENDING, || {
            ready(Ok::<_, ApiError>(Trending {
                trending_products: catalog.trending(None, limit),
            }))
        })
        .await?;
    respond(lookup)
}

/// `POST /api/products`
pub async fn create_product(
    State(state): State<AppState>,
    Json(new): Json<NewProduct>,
) -> ApiResult<impl IntoResponse> {
    if new.name.trim().is_empty() {
        return Err(ApiError::bad_request("Product name is required"));
    }
    validate_price(new.price)?;

    let product = state.catalog.create_product(new);
    tracing::info!(product_id = %product.id, "product created");
    state.invalidator.schedule(Mutation::ProductCreated);
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /api/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<Product>> {
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    let product = state
        .catalog
        .update_product(&id, patch)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    state.invalidator.schedule(Mutation::ProductUpdated { id });
    Ok(Json(product))
}

/// `DELETE /api/products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.catalog.delete_product(&id) {
        return Err(ApiError::not_found("Product not found"));
    }
    tracing::info!(product_id = %id, "product deleted");
    state.invalidator.schedule(Mutation::ProductDeleted { id });
    Ok(Json(json!({ "message": "Product deleted" })))
}

fn validate_price(price: f64) -> ApiResult<()> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::bad_request("Price must be a non-negative number"))
    }
}
