//! Token issuing operations: registration, login and identity lookup.
//!
//! These are the only write paths into the credential store.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::extractor::AuthError;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::TokenIssuer;
use crate::auth::user_store::UserStore;
use crate::auth::validation::{normalize_email, validate_login, validate_registration};
use crate::db::schema::{AuditAction, AuditLogCreate, UserCreate, UserRecord};
use crate::model::{AuthResponse, LoginRequest, RegisterRequest, UserProfile, UserSummary};
use crate::types::UserId;

pub struct AuthService {
    users: Arc<UserStore>,
    tokens: Arc<TokenIssuer>,
}

impl AuthService {
    pub fn new(users: Arc<UserStore>, tokens: Arc<TokenIssuer>) -> Self {
        Self { users, tokens }
    }

    pub fn users(&self) -> &Arc<UserStore> {
        &self.users
    }

    pub fn tokens(&self) -> &Arc<TokenIssuer> {
        &self.tokens
    }

    /// Validate, create the user, and issue a token bound to the new id.
    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        let errors = validate_registration(req);
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let email = normalize_email(&req.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let password_hash =
            hash_password(&req.password).map_err(|e| AuthError::Internal(e.to_string()))?;

        let create = UserCreate {
            email: email.clone(),
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            graduation_year: req.graduation_year,
            major: req.major.clone().filter(|m| !m.trim().is_empty()),
            is_admin: false,
        };

        let user = match self.users.create_user(&create).await {
            Ok(user) => user,
            Err(e) => {
                // A concurrent registration may have won the unique index.
                if self.find_by_email(&email).await?.is_some() {
                    return Err(AuthError::Conflict);
                }
                return Err(AuthError::DatabaseError(e.to_string()));
            }
        };

        let token = self
            .tokens
            .issue(&user.uid)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        info!(user_id = %user.uid, email = %user.email, "User registered");
        self.audit(&user.uid, AuditAction::Register).await;

        Ok(AuthResponse {
            token,
            user: UserSummary::registered(&user),
        })
    }

    /// Check credentials and issue a fresh token.
    ///
    /// An unknown email and a wrong password produce the same error.
    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let errors = validate_login(req);
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }
        let password = req.password.as_deref().unwrap_or_default();

        let user = self
            .find_by_email(&normalize_email(&req.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let matches = verify_password(password, &user.password_hash).unwrap_or_else(|e| {
            warn!(user_id = %user.uid, "Stored password hash is unreadable: {}", e);
            false
        });
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(&user.uid)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        info!(user_id = %user.uid, "User logged in");
        self.audit(&user.uid, AuditAction::Login).await;

        Ok(AuthResponse {
            token,
            user: UserSummary::logged_in(&user),
        })
    }

    /// Resolve a verified user id to its profile.
    pub async fn current_user(&self, user_id: &UserId) -> Result<UserProfile, AuthError> {
        let user = self
            .users
            .get_user_by_id(user_id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserProfile::from(&user))
    }

    /// Create an admin account, or promote and re-password an existing one.
    ///
    /// Returns the user and whether it was newly created.
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(UserRecord, bool), AuthError> {
        let email = normalize_email(email);

        if let Some(existing) = self.find_by_email(&email).await? {
            let password_hash =
                hash_password(password).map_err(|e| AuthError::Internal(e.to_string()))?;
            self.users
                .set_password_hash(&existing.uid, &password_hash)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
            self.users
                .set_admin(&existing.uid, true)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
            self.audit(&existing.uid, AuditAction::AdminGranted).await;

            let user = self
                .users
                .get_user_by_id(&existing.uid)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?
                .ok_or(AuthError::UserNotFound)?;
            return Ok((user, false));
        }

        let req = RegisterRequest {
            email: email.clone(),
            password: password.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            graduation_year: None,
            major: None,
        };
        let errors = validate_registration(&req);
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let create = UserCreate {
            email,
            password_hash: hash_password(password)
                .map_err(|e| AuthError::Internal(e.to_string()))?,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            graduation_year: None,
            major: None,
            is_admin: true,
        };
        let user = self
            .users
            .create_user(&create)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        self.audit(&user.uid, AuditAction::AdminGranted).await;

        Ok((user, true))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        self.users
            .get_user_by_email(email)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }

    async fn audit(&self, user_id: &UserId, action: AuditAction) {
        let entry = AuditLogCreate {
            user_id: Some(user_id.to_string()),
            action: action.as_str().to_string(),
            resource_type: "user".to_string(),
            resource_id: Some(user_id.to_string()),
            details: None,
        };
        if let Err(e) = self.users.audit_log(entry).await {
            warn!(user_id = %user_id, "Failed to write audit entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use crate::model::FieldError;

    async fn setup_service() -> AuthService {
        let db = create_connection(DatabaseConfig::memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        AuthService::new(
            Arc::new(UserStore::new(db)),
            Arc::new(TokenIssuer::with_default_ttl("test-secret")),
        )
    }

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "secret1".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            graduation_year: Some(2010),
            major: Some("History".to_string()),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_issues_token_for_new_user() {
        let service = setup_service().await;

        let res = service.register(&registration("a@x.com")).await.unwrap();
        assert_eq!(res.user.email, "a@x.com");
        assert_eq!(res.user.first_name, "A");
        assert!(res.user.is_admin.is_none());

        let claims = service.tokens().verify(res.token.as_str()).unwrap();
        assert_eq!(claims.user_id(), res.user.id);

        let profile = service.current_user(&res.user.id).await.unwrap();
        assert_eq!(profile.email, "a@x.com");
        assert_eq!(profile.graduation_year, Some(2010));
        assert_eq!(profile.major.as_deref(), Some("History"));
    }

    #[tokio::test]
    async fn test_register_twice_is_conflict() {
        let service = setup_service().await;

        service.register(&registration("a@x.com")).await.unwrap();
        let err = service.register(&registration("A@X.com ")).await.unwrap_err();
        assert_eq!(err, AuthError::Conflict);

        assert_eq!(service.users().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_registration_creates_one_user() {
        let service = setup_service().await;
        let first = registration("a@x.com");
        let second = registration("A@x.com");

        let (a, b) = tokio::join!(service.register(&first), service.register(&second));

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(AuthError::Conflict))));
        assert_eq!(service.users().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let service = setup_service().await;

        let mut req = registration("not-an-email");
        req.password = "short".to_string();
        let err = service.register(&req).await.unwrap_err();

        assert_eq!(
            err,
            AuthError::Validation(vec![
                FieldError::new("email", "Please include a valid email"),
                FieldError::new("password", "Password must be at least 6 characters"),
            ])
        );
        assert!(service.users().list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_success_includes_admin_flag() {
        let service = setup_service().await;
        service.register(&registration("a@x.com")).await.unwrap();

        let res = service.login(&login("a@x.com", "secret1")).await.unwrap();
        assert_eq!(res.user.is_admin, Some(false));
        assert_eq!(res.user.graduation_year, Some(2010));
        assert!(service.tokens().verify(res.token.as_str()).is_ok());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = setup_service().await;
        service.register(&registration("a@x.com")).await.unwrap();

        let wrong_password = service.login(&login("a@x.com", "wrong-pw")).await.unwrap_err();
        let unknown_email = service.login(&login("nobody@x.com", "secret1")).await.unwrap_err();

        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_validation() {
        let service = setup_service().await;

        let err = service
            .login(&LoginRequest {
                email: "bad".to_string(),
                password: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(ref e) if e.len() == 2));
    }

    #[tokio::test]
    async fn test_current_user_missing() {
        let service = setup_service().await;
        let err = service.current_user(&UserId::new("gone")).await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound);
    }

    #[tokio::test]
    async fn test_register_and_login_are_audited() {
        let service = setup_service().await;
        let res = service.register(&registration("a@x.com")).await.unwrap();
        service.login(&login("a@x.com", "secret1")).await.unwrap();

        let actions: Vec<String> = service
            .users()
            .get_user_audit_log(&res.user.id, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.action)
            .collect();
        assert_eq!(actions.len(), 2);
        assert!(actions.contains(&"register".to_string()));
        assert!(actions.contains(&"login".to_string()));
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_then_promotes() {
        let service = setup_service().await;

        let (admin, created) = service
            .ensure_admin("root@x.com", "rootpass", "Root", "Admin")
            .await
            .unwrap();
        assert!(created);
        assert!(admin.is_admin);

        let reg = service.register(&registration("a@x.com")).await.unwrap();
        let (promoted, created) = service
            .ensure_admin("a@x.com", "newpass1", "ignored", "ignored")
            .await
            .unwrap();
        assert!(!created);
        assert!(promoted.is_admin);
        assert_eq!(promoted.uid, reg.user.id);

        let res = service.login(&login("a@x.com", "newpass1")).await.unwrap();
        assert_eq!(res.user.is_admin, Some(true));
    }
}
