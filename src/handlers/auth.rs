use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    auth::AuthUser,
    entities::user,
    services::users::{LoginInput, RegisterInput},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: user::Model,
    pub token: String,
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> ApiResult<AuthResponse> {
    let (user, token) = state.services.users.register(payload).await?;
    Ok(Json(ApiResponse::success(AuthResponse { user, token })))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> ApiResult<AuthResponse> {
    let (user, token) = state.services.users.login(payload).await?;
    Ok(Json(ApiResponse::success(AuthResponse { user, token })))
}

/// GET /api/v1/auth/profile
pub async fn profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<user::Model> {
    let profile = state.services.users.profile(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
