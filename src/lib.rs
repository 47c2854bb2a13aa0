//! Storefront API Library
//!
//! This crate provides the core functionality for the storefront backend:
//! catalog, carts, checkout, payment capture and order tracking.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// Enhanced API routes function
pub fn api_v1_routes() -> Router<AppState> {
    // Auth: registration, login, profile
    let auth = Router::new()
        .route("/auth/register", axum::routing::post(handlers::auth::register))
        .route("/auth/login", axum::routing::post(handlers::auth::login))
        .route("/auth/profile", get(handlers::auth::profile));

    // Catalog: public reads, admin-gated writes (enforced by extractors)
    let products = Router::new()
        .route(
            "/products",
            get(handlers::products::list_products)
                .post(handlers::products::create_product),
        )
        .route("/products/top", get(handlers::products::top_products))
        .route("/products/random", get(handlers::products::random_products))
        .route(
            "/products/{id}",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        );

    // Cart: always scoped to the authenticated user
    let cart = Router::new()
        .route(
            "/cart",
            get(handlers::carts::get_cart)
                .post(handlers::carts::add_to_cart)
                .delete(handlers::carts::clear_cart),
        )
        .route(
            "/cart/{item_id}",
            axum::routing::put(handlers::carts::update_cart_item)
                .delete(handlers::carts::remove_cart_item),
        );

    // Orders: checkout quote and creation, payment verification, admin
    // status/fulfillment updates
    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/orders/checkout",
            get(handlers::orders::get_checkout_data).post(handlers::orders::create_order),
        )
        .route("/orders/mine", get(handlers::orders::get_my_orders))
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/orders/{id}/verify",
            axum::routing::post(handlers::orders::verify_payment),
        )
        .route(
            "/orders/{id}/status",
            axum::routing::put(handlers::orders::update_order_status),
        )
        .route(
            "/orders/{id}/deliver",
            axum::routing::put(handlers::orders::deliver_order),
        );

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(auth)
        .merge(products)
        .merge(cart)
        .merge(orders)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "storefront-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    // Check database connectivity
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
