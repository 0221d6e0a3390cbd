//! Request gates: identity first, then entitlement.

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use http::{HeaderMap, header, request::Parts};
use tracing::debug;

use crate::api::error::{ApiError, ErrorDetail};
use crate::api::{AppState, today};
use crate::auth::{AuthError, UserContext};

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the bearer token to a [`UserContext`] and attach it to the
/// request. Requests without a usable token never reach the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();
    let ip_address = header_value(headers, header::HeaderName::from_static("x-forwarded-for"))
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let user_agent = header_value(headers, header::USER_AGENT).map(str::to_string);

    let context = state.extractor.extract_user(
        header_value(headers, header::AUTHORIZATION),
        ip_address,
        user_agent,
    )?;
    debug!(user_id = %context.user_id(), expires_at = ?context.expires_at(), "Authenticated request");

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Let the request through only when the resolved user holds a current
/// membership (or is an admin). Must run after [`require_auth`].
pub async fn require_membership(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = request
        .extensions()
        .get::<UserContext>()
        .ok_or(AuthError::MissingToken)?;

    state.gate.check_membership(context.user_id(), today()).await?;
    debug!(user_id = %context.user_id(), "Membership gate passed");

    Ok(next.run(request).await)
}

/// Rewrite server error bodies to include their internal detail.
///
/// Only installed in development mode.
pub async fn expose_error_detail(response: Response) -> Response {
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let body = serde_json::json!({
        "message": crate::api::error::SERVER_ERROR_MESSAGE,
        "detail": detail,
    });
    Response::from_parts(parts, axum::body::Body::from(body.to_string()))
}

/// Identity taken from a request that already passed [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserContext);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AuthError::MissingToken.into())
    }
}

/// Identity of an administrator. Rejects everyone else with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserContext);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(context) = AuthUser::from_request_parts(parts, state).await?;
        state.gate.check_admin(context.user_id()).await?;
        Ok(AdminUser(context))
    }
}
