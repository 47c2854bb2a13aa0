use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::{AdminUser, AuthUser},
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    services::{
        orders::{AddressInput, CreateOrderInput, OrderWithItems, VerifyPaymentInput},
        pricing::QuoteItem,
    },
    ApiResponse, ApiResult, AppState,
};

/// Line item as submitted by the storefront. `product`/`qty` are the wire
/// names the web client has always used.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    #[serde(alias = "product")]
    pub product_id: Uuid,
    #[serde(alias = "qty")]
    pub quantity: i32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
}

impl From<OrderItemInput> for QuoteItem {
    fn from(input: OrderItemInput) -> Self {
        QuoteItem {
            product_id: input.product_id,
            quantity: input.quantity,
            selected_size: input.selected_size,
            selected_color: input.selected_color,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: AddressInput,
    pub payment_method: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckoutQuery {
    /// Quote a single product (quantity 1) instead of a cart
    pub product_id: Option<Uuid>,
    /// JSON-encoded cart payload: `{"items":[{"product":"...","qty":2}]}`
    pub cart: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CartPayload {
    #[serde(default)]
    items: Vec<OrderItemInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Quote plus the address the checkout form should be pre-filled with
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutData {
    pub items: Vec<crate::services::pricing::QuotedLine>,
    pub subtotal: rust_decimal::Decimal,
    pub tax: rust_decimal::Decimal,
    pub shipping: rust_decimal::Decimal,
    pub total: rust_decimal::Decimal,
    pub shipping_address: Value,
}

/// GET /api/v1/orders/checkout
///
/// Computes a quote for either a single product or the submitted cart
/// payload. Prices always come from the catalog of record; the cart path
/// also validates stock so the form can surface shortages before payment.
#[utoipa::path(
    get,
    path = "/api/v1/orders/checkout",
    params(CheckoutQuery),
    responses(
        (status = 200, description = "Checkout quote"),
        (status = 400, description = "Empty or malformed cart"),
        (status = 404, description = "Referenced product missing")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_checkout_data(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CheckoutQuery>,
) -> ApiResult<CheckoutData> {
    let items: Vec<QuoteItem> = if let Some(product_id) = query.product_id {
        vec![QuoteItem {
            product_id,
            quantity: 1,
            selected_size: None,
            selected_color: None,
        }]
    } else {
        let raw = query.cart.unwrap_or_default();
        let payload: CartPayload = serde_json::from_str(&raw)
            .map_err(|_| ServiceError::ValidationError("Malformed cart payload".to_string()))?;
        if payload.items.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }
        payload.items.into_iter().map(QuoteItem::from).collect()
    };

    let quote = state.services.orders.quote(&items).await?;
    if query.product_id.is_none() {
        state.services.orders.validate_stock(&items).await?;
    }

    let profile = state.services.users.profile(user.user_id).await?;
    let shipping_address = profile.shipping_address.unwrap_or_else(|| {
        json!({
            "address": "",
            "city": "",
            "postal_code": "",
            "country": state.config.pricing.default_country,
        })
    });

    Ok(Json(ApiResponse::success(CheckoutData {
        items: quote.items,
        subtotal: quote.subtotal,
        tax: quote.tax,
        shipping: quote.shipping,
        total: quote.total,
        shipping_address,
    })))
}

/// POST /api/v1/orders (and /api/v1/orders/checkout)
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created"),
        (status = 400, description = "Validation failure or insufficient stock"),
        (status = 404, description = "Referenced product missing"),
        (status = 502, description = "Payment gateway unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<OrderWithItems> {
    let input = CreateOrderInput {
        items: payload.items.into_iter().map(QuoteItem::from).collect(),
        shipping_address: payload.shipping_address,
        payment_method: payload.payment_method,
    };

    let order = state.services.orders.create_order(user.user_id, input).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /api/v1/orders/{id}/verify
///
/// Accepts the gateway callback fields and marks the order paid when the
/// signature checks out. The client-side "payment succeeded" claim on its
/// own is never trusted.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/verify",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = VerifyPaymentInput,
    responses(
        (status = 200, description = "Payment verified, order processing"),
        (status = 400, description = "Bad signature or order not payable"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyPaymentInput>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .orders
        .verify_payment(id, user.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// GET /api/v1/orders/mine
pub async fn get_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<order::Model>> {
    let orders = state.services.orders.list_for_user(user.user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /api/v1/orders/{id} — owner or admin only
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderWithItems> {
    let order = state.services.orders.get_order(id).await?;
    if order.order.user_id != user.user_id && !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "Not authorized to view this order".to_string(),
        ));
    }
    Ok(Json(ApiResponse::success(order)))
}

/// GET /api/v1/orders — admin listing
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Vec<order::Model>> {
    let orders = state.services.orders.list_all().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// PUT /api/v1/orders/{id}/status
///
/// Admin override onto any recognized status; an unknown value is rejected
/// before anything is touched.
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Unrecognized status value"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<order::Model> {
    let status = OrderStatus::from_str(payload.status.trim())
        .map_err(|_| ServiceError::InvalidStatus(payload.status.clone()))?;

    let order = state.services.order_status.update_status(id, status).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// PUT /api/v1/orders/{id}/deliver
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order marked delivered"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn deliver_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.services.order_status.mark_delivered(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_item_input_accepts_storefront_aliases() {
        let json = r#"{"product": "550e8400-e29b-41d4-a716-446655440000", "qty": 2}"#;
        let item: OrderItemInput = serde_json::from_str(json).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(
            item.product_id.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn verify_payment_input_accepts_camel_case_gateway_fields() {
        let json = r#"{
            "razorpayOrderId": "order_abc",
            "razorpayPaymentId": "pay_xyz",
            "razorpaySignature": "deadbeef"
        }"#;
        let input: VerifyPaymentInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.razorpay_order_id, "order_abc");
        assert_eq!(input.razorpay_payment_id, "pay_xyz");
        assert_eq!(input.razorpay_signature, "deadbeef");
    }

    #[test]
    fn cart_payload_parses_query_string_json() {
        let raw = r#"{"items":[{"product":"550e8400-e29b-41d4-a716-446655440000","qty":3}]}"#;
        let payload: CartPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].quantity, 3);
    }

    #[test]
    fn unknown_status_values_fail_parsing() {
        assert!(OrderStatus::from_str("refunded").is_err());
        assert!(OrderStatus::from_str("shipped").is_ok());
    }
}
