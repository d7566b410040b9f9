use std::future::ready;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use storefront_cache::{Mutation, keys};

use super::{clamp_limit, respond, ttl};
use crate::catalog::NewReview;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
}

/// `GET /api/reviews/product/{product_id}`
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<ReviewParams>,
) -> ApiResult<Json<Value>> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = clamp_limit(params.limit, 10);
    let sort = params
        .sort_by
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "-createdAt".to_string());

    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(
            &keys::product_reviews(&product_id, page, limit, &sort),
            ttl::REVIEWS,
            || {
                ready(
                    catalog
                        .reviews_for(&product_id, page, limit, &sort)
                        .ok_or_else(|| ApiError::not_found("Product not found")),
                )
            },
        )
        .await?;
    respond(lookup)
}

/// `POST /api/reviews/product/{product_id}`
pub async fn create_review(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(new): Json<NewReview>,
) -> ApiResult<impl IntoResponse> {
    if !(1..=5).contains(&new.rating) {
        return Err(ApiError::bad_request("Rating must be between 1 and 5"));
    }
    if new.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }

    let review = state
        .catalog
        .add_review(&product_id, new)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    state
        .invalidator
        .schedule(Mutation::ReviewChanged { product_id });
    Ok((StatusCode::CREATED, Json(review)))
}

/// `DELETE /api/reviews/{review_id}`
pub async fn delete_review(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let review = state
        .catalog
        .delete_review(&review_id)
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    state.invalidator.schedule(Mutation::ReviewChanged {
        product_id: review.product_id,
    });
    Ok(Json(json!({ "message": "Review deleted" })))
}
