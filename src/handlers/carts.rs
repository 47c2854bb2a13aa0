use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    services::carts::{AddToCartInput, CartWithItems, UpdateCartItemInput},
    ApiResponse, ApiResult, AppState,
};

/// GET /api/v1/cart
///
/// Returns the caller's cart. Items whose size/color selection no longer
/// matches the product's option lists are pruned here, silently.
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<CartWithItems> {
    let cart = state.services.carts.get_cart(user.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// POST /api/v1/cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartInput>,
) -> ApiResult<CartWithItems> {
    let cart = state.services.carts.add_item(user.user_id, payload).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// PUT /api/v1/cart/{item_id}
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemInput>,
) -> ApiResult<CartWithItems> {
    let cart = state
        .services
        .carts
        .update_item(user.user_id, item_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// DELETE /api/v1/cart/{item_id}
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> ApiResult<CartWithItems> {
    let cart = state
        .services
        .carts
        .remove_item(user.user_id, item_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// DELETE /api/v1/cart
pub async fn clear_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<&'static str> {
    state.services.carts.clear_cart(user.user_id).await?;
    Ok(Json(ApiResponse::success("Cart cleared")))
}
