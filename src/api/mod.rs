// REST API for the portal

mod auth;
mod directory;
pub mod error;
pub mod middleware;
mod memberships;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    middleware::{from_fn_with_state, map_response},
    response::Json,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthExtractor, AuthService, TokenIssuer, UserStore};
use crate::config::PortalConfig;
use crate::db::{Db, create_connection, ensure_schema};
use crate::membership::{MembershipGate, MembershipService, MembershipStore};

pub use error::ApiError;

/// Everything a request handler can reach.
pub struct ApiContext {
    pub auth: AuthService,
    pub extractor: AuthExtractor,
    pub gate: MembershipGate,
    pub memberships: MembershipService,
    pub users: Arc<UserStore>,
    pub dev_mode: bool,
}

pub type AppState = Arc<ApiContext>;

impl ApiContext {
    pub fn new(db: Db, config: &PortalConfig) -> Self {
        let users = Arc::new(UserStore::new(db.clone()));
        let membership_store = Arc::new(MembershipStore::new(db));
        let tokens = Arc::new(TokenIssuer::new(&config.jwt_secret, config.token_ttl()));

        Self {
            auth: AuthService::new(users.clone(), tokens.clone()),
            extractor: AuthExtractor::new(tokens),
            gate: MembershipGate::new(users.clone(), membership_store.clone()),
            memberships: MembershipService::new(membership_store, users.clone()),
            users,
            dev_mode: config.dev_mode,
        }
    }

    /// Connect to the configured database, make sure the schema exists and
    /// wire up the services.
    pub async fn connect(config: &PortalConfig) -> Result<AppState> {
        config.validate()?;
        let db = create_connection(config.database.clone()).await?;
        ensure_schema(&db).await?;
        Ok(Arc::new(Self::new(db, config)))
    }
}

/// Calendar date used for membership checks.
pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/memberships",
            get(memberships::list_all).post(memberships::create),
        )
        .route("/memberships/my-membership", get(memberships::my_membership))
        .route("/memberships/stats", get(memberships::stats))
        .route("/memberships/{id}/cancel", put(memberships::cancel))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    // Layers added last run first: identity, then membership.
    let members_only = Router::new()
        .route("/directory", get(directory::list))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_membership))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/test", get(auth::test))
        .merge(authenticated)
        .merge(members_only);

    if state.dev_mode {
        router = router.layer(map_response(middleware::expose_error_detail));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConfig;
    use crate::types::UserId;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    async fn setup() -> (AppState, Router) {
        let mut config = PortalConfig::new(SECRET);
        config.database = DatabaseConfig::memory();
        let state = ApiContext::connect(&config).await.unwrap();
        let router = create_router(state.clone());
        (state, router)
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(router: &Router, email: &str) -> String {
        let (status, body) = send(
            router,
            Method::POST,
            "/auth/register",
            None,
            Some(serde_json::json!({
                "email": email,
                "password": "secret1",
                "firstName": "A",
                "lastName": "B"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(state: &AppState) -> String {
        let (admin, _) = state
            .auth
            .ensure_admin("admin@x.com", "adminpw", "Ada", "Admin")
            .await
            .unwrap();
        state.auth.tokens().issue(&admin.uid).unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, router) = setup().await;
        let (status, body) = send(&router, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&router, Method::GET, "/auth/test", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Auth routes working");
    }

    #[tokio::test]
    async fn test_register_then_me() {
        let (_, router) = setup().await;
        let token = register(&router, "a@x.com").await;

        let (status, body) = send(&router, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["firstName"], "A");
        assert_eq!(body["email"], "a@x.com");
        assert!(body.get("passwordHash").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let (_, router) = setup().await;
        register(&router, "a@x.com").await;

        let (status, body) = send(
            &router,
            Method::POST,
            "/auth/register",
            None,
            Some(serde_json::json!({
                "email": "A@X.com",
                "password": "another1",
                "firstName": "C",
                "lastName": "D"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let (_, router) = setup().await;
        let (status, body) = send(
            &router,
            Method::POST,
            "/auth/register",
            None,
            Some(serde_json::json!({ "email": "nope", "password": "123" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation failed");

        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
        assert!(fields.contains(&"firstName"));
        assert!(fields.contains(&"lastName"));
    }

    #[tokio::test]
    async fn test_malformed_bodies_fail_validation() {
        let (_, router) = setup().await;

        let (status, body) = send(
            &router,
            Method::POST,
            "/auth/register",
            None,
            Some(serde_json::json!({
                "email": "a@x.com",
                "password": "secret1",
                "firstName": "A",
                "lastName": "B",
                "graduationYear": "2010"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0]["field"], "body");

        // Plain text with no content type.
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .body(Body::from("not json"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Validation failed");

        let token = register(&router, "b@x.com").await;
        let (status, body) = send(
            &router,
            Method::POST,
            "/memberships",
            Some(&token),
            Some(serde_json::json!({ "amountPaid": 50.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (_, router) = setup().await;
        register(&router, "a@x.com").await;

        let wrong_password = send(
            &router,
            Method::POST,
            "/auth/login",
            None,
            Some(serde_json::json!({ "email": "a@x.com", "password": "wrong-pw" })),
        )
        .await;
        let unknown_email = send(
            &router,
            Method::POST,
            "/auth/login",
            None,
            Some(serde_json::json!({ "email": "b@x.com", "password": "secret1" })),
        )
        .await;

        assert_eq!(wrong_password.0, StatusCode::BAD_REQUEST);
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password.1["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_returns_admin_flag() {
        let (_, router) = setup().await;
        register(&router, "a@x.com").await;

        let (status, body) = send(
            &router,
            Method::POST,
            "/auth/login",
            None,
            Some(serde_json::json!({ "email": "a@x.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["isAdmin"], false);
    }

    #[tokio::test]
    async fn test_me_rejects_missing_and_bad_tokens() {
        let (state, router) = setup().await;

        let (status, body) = send(&router, Method::GET, "/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "No token, authorization denied");

        let (status, body) = send(&router, Method::GET, "/auth/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Token is not valid");

        let foreign = TokenIssuer::with_default_ttl("other-secret")
            .issue(&UserId::new("someone"))
            .unwrap();
        let (status, _) = send(&router, Method::GET, "/auth/me", Some(foreign.as_str()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let eight_days_ago = chrono::Utc::now() - chrono::Duration::days(8);
        let expired = state
            .auth
            .tokens()
            .issue_at(&UserId::new("someone"), eight_days_ago)
            .unwrap();
        let (status, _) = send(&router, Method::GET, "/auth/me", Some(expired.as_str()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_for_vanished_user_is_not_found() {
        let (state, router) = setup().await;
        let token = state.auth.tokens().issue(&UserId::new("ghost")).unwrap();

        let (status, body) = send(&router, Method::GET, "/auth/me", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }

    #[tokio::test]
    async fn test_directory_requires_membership() {
        let (_, router) = setup().await;
        let token = register(&router, "a@x.com").await;

        let (status, _) = send(&router, Method::GET, "/directory", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&router, Method::GET, "/directory", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Membership required to access this resource");

        let (status, body) = send(
            &router,
            Method::GET,
            "/memberships/my-membership",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_membership"], false);

        let (status, body) = send(
            &router,
            Method::POST,
            "/memberships",
            Some(&token),
            Some(serde_json::json!({ "membershipType": "annual", "amountPaid": 50.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["membershipType"], "annual");

        let (status, body) = send(&router, Method::GET, "/directory", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["firstName"], "A");
        assert!(body[0].get("email").is_none());

        let (_, body) = send(
            &router,
            Method::GET,
            "/memberships/my-membership",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["has_membership"], true);
        assert_eq!(body["membership"]["membershipType"], "annual");
    }

    #[tokio::test]
    async fn test_second_purchase_is_rejected() {
        let (_, router) = setup().await;
        let token = register(&router, "a@x.com").await;
        let purchase = serde_json::json!({ "membershipType": "monthly", "amountPaid": 5.0 });

        let (status, _) = send(&router, Method::POST, "/memberships", Some(&token), Some(purchase.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&router, Method::POST, "/memberships", Some(&token), Some(purchase)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "You already have an active membership");

        let (status, body) = send(
            &router,
            Method::POST,
            "/memberships",
            Some(&token),
            Some(serde_json::json!({ "membershipType": "weekly" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "You already have an active membership");
    }

    #[tokio::test]
    async fn test_admin_bypasses_membership_gate() {
        let (state, router) = setup().await;
        let token = admin_token(&state).await;

        let (status, _) = send(&router, Method::GET, "/directory", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_endpoints() {
        let (state, router) = setup().await;
        let member = register(&router, "a@x.com").await;
        send(
            &router,
            Method::POST,
            "/memberships",
            Some(&member),
            Some(serde_json::json!({ "membershipType": "lifetime", "amountPaid": 500.0 })),
        )
        .await;

        let (status, body) = send(&router, Method::GET, "/memberships/stats", Some(&member), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin access required");

        let admin = admin_token(&state).await;
        let (status, body) = send(&router, Method::GET, "/memberships/stats", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_memberships"], 1);
        assert_eq!(body["total_revenue"], 500.0);
        assert_eq!(body["by_type"][0]["type"], "lifetime");

        let (status, body) = send(&router, Method::GET, "/memberships", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_membership() {
        let (_, router) = setup().await;
        let owner = register(&router, "a@x.com").await;
        let other = register(&router, "b@x.com").await;

        let (_, created) = send(
            &router,
            Method::POST,
            "/memberships",
            Some(&owner),
            Some(serde_json::json!({ "membershipType": "annual", "amountPaid": 50.0 })),
        )
        .await;
        let uri = format!("/memberships/{}/cancel", created["id"].as_str().unwrap());

        let (status, body) = send(&router, Method::PUT, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized to cancel this membership");

        let (status, body) = send(&router, Method::PUT, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isActive"], false);

        let (status, _) = send(&router, Method::GET, "/directory", Some(&owner), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&router, Method::PUT, "/memberships/missing/cancel", Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_detail_only_in_dev_mode() {
        async fn failing() -> Result<Json<Value>, ApiError> {
            Err(ApiError::Server("disk on fire".to_string()))
        }

        let quiet = Router::new().route("/boom", get(failing));
        let verbose = Router::new()
            .route("/boom", get(failing))
            .layer(map_response(middleware::expose_error_detail));

        let (status, body) = send(&quiet, Method::GET, "/boom", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "message": "Server error" }));

        let (status, body) = send(&verbose, Method::GET, "/boom", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server error");
        assert_eq!(body["detail"], "disk on fire");
    }
}
