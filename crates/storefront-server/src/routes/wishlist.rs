use std::future::ready;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use storefront_cache::{Mutation, keys};

use super::{respond, ttl};
use crate::catalog::Product;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Wishlist {
    user_id: String,
    products: Vec<Product>,
}

/// `GET /api/wishlist/{user_id}`
pub async fn get_wishlist(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let catalog = &state.catalog;
    let lookup = state
        .cache
        .get_or_load(&keys::wishlist(&user_id), ttl::WISHLIST, || {
            ready(Ok::<_, ApiError>(Wishlist {
                products: catalog.wishlist(&user_id),
                user_id: user_id.clone(),
            }))
        })
        .await?;
    respond(lookup)
}

/// `POST /api/wishlist/{user_id}/{product_id}`
pub async fn add_item(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let added = state
        .catalog
        .add_to_wishlist(&user_id, &product_id)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    if !added {
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "Product already in wishlist" })),
        ));
    }
    state.invalidator.schedule(Mutation::WishlistChanged { user_id });
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Product added to wishlist" })),
    ))
}

/// `DELETE /api/wishlist/{user_id}/{product_id}`
pub async fn remove_item(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    if !state.catalog.remove_from_wishlist(&user_id, &product_id) {
        return Err(ApiError::not_found("Product not in wishlist"));
    }
    state.invalidator.schedule(Mutation::WishlistChanged { user_id });
    Ok(Json(json!({ "message": "Product removed from wishlist" })))
}
