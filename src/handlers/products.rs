use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::product,
    services::products::{CreateProductInput, UpdateProductInput},
    ApiResponse, ApiResult, AppState,
};

const TOP_PRODUCTS_LIMIT: u64 = 3;
const RANDOM_PRODUCTS_LIMIT: u64 = 5;

fn default_page() -> u64 {
    1
}
fn default_page_size() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<product::Model>,
    pub page: u64,
    pub pages: u64,
    pub count: u64,
}

/// GET /api/v1/products — public catalog listing
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<ProductListResponse> {
    let page = state
        .services
        .products
        .list(query.page, query.page_size, query.keyword.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(ProductListResponse {
        products: page.products,
        page: page.page,
        pages: page.pages,
        count: page.count,
    })))
}

/// GET /api/v1/products/top
pub async fn top_products(State(state): State<AppState>) -> ApiResult<Vec<product::Model>> {
    let products = state.services.products.top(TOP_PRODUCTS_LIMIT).await?;
    Ok(Json(ApiResponse::success(products)))
}

/// GET /api/v1/products/random
pub async fn random_products(State(state): State<AppState>) -> ApiResult<Vec<product::Model>> {
    let products = state.services.products.random(RANDOM_PRODUCTS_LIMIT).await?;
    Ok(Json(ApiResponse::success(products)))
}

/// GET /api/v1/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<product::Model> {
    let product = state.services.products.get(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// POST /api/v1/products — admin
pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductInput>,
) -> ApiResult<product::Model> {
    let product = state.services.products.create(payload).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// PUT /api/v1/products/{id} — admin
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> ApiResult<product::Model> {
    let product = state.services.products.update(id, payload).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// DELETE /api/v1/products/{id} — admin
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<&'static str> {
    state.services.products.delete(id).await?;
    Ok(Json(ApiResponse::success("Product removed")))
}
