use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::api::error::ApiError;
use crate::api::middleware::{AdminUser, AuthUser};
use crate::api::{AppState, today};
use crate::model::{MembershipPurchase, MembershipStats, MembershipStatus, MembershipView};
use crate::types::MembershipId;

pub async fn my_membership(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
) -> Result<Json<MembershipStatus>, ApiError> {
    Ok(Json(
        state
            .gate
            .membership_status(context.user_id(), today())
            .await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    payload: Result<Json<MembershipPurchase>, JsonRejection>,
) -> Result<(StatusCode, Json<MembershipView>), ApiError> {
    let Json(purchase) = payload?;
    let view = state
        .memberships
        .purchase(&context, &purchase, today())
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn cancel(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MembershipView>, ApiError> {
    let is_admin = state
        .users
        .is_admin(context.user_id())
        .await?
        .unwrap_or(false);

    let view = state
        .memberships
        .cancel(&context, is_admin, &MembershipId::new(id))
        .await?;
    Ok(Json(view))
}

pub async fn list_all(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<MembershipView>>, ApiError> {
    Ok(Json(state.memberships.list().await?))
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<MembershipStats>, ApiError> {
    Ok(Json(state.memberships.stats(today()).await?))
}
