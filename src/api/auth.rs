use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode};
use serde_json::Value;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::middleware::AuthUser;
use crate::model::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(req) = payload?;
    let response = state.auth.register(&req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = payload?;
    Ok(Json(state.auth.login(&req).await?))
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.auth.current_user(context.user_id()).await?))
}

/// Liveness of the auth routes; needs no token.
pub async fn test() -> Json<Value> {
    Json(serde_json::json!({ "message": "Auth routes working" }))
}
