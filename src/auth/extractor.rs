//! Authentication extractor for HTTP requests.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::auth::context::UserContext;
use crate::auth::token::TokenIssuer;
use crate::model::FieldError;

/// Authentication errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Malformed input, one entry per offending field
    Validation(Vec<FieldError>),
    /// Email already registered
    Conflict,
    /// Unknown email or wrong password; deliberately indistinguishable
    InvalidCredentials,
    /// No bearer token on the request
    MissingToken,
    /// Token malformed, expired or signed with another secret
    InvalidToken,
    /// Token verified but the user it names no longer exists
    UserNotFound,
    /// Database error
    DatabaseError(String),
    /// Unexpected internal failure
    Internal(String),
}

impl AuthError {
    /// Whether this error means "no usable identity on the request".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::MissingToken | Self::InvalidToken)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "Validation failed ({} fields)", errors.len()),
            Self::Conflict => write!(f, "User already exists"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::MissingToken => write!(f, "No token, authorization denied"),
            Self::InvalidToken => write!(f, "Token is not valid"),
            Self::UserNotFound => write!(f, "User not found"),
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Resolves the `Authorization` header of a request to a user identity.
///
/// Purely a gate: verification is stateless and has no side effects.
pub struct AuthExtractor {
    tokens: Arc<TokenIssuer>,
}

impl AuthExtractor {
    /// Create a new auth extractor.
    pub fn new(tokens: Arc<TokenIssuer>) -> Self {
        Self { tokens }
    }

    /// Extract user context from the raw `Authorization` header value.
    pub fn extract_user(
        &self,
        authorization: Option<&str>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<UserContext, AuthError> {
        let header = authorization.ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.tokens.verify(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            AuthError::InvalidToken
        })?;

        debug!(user_id = %claims.sub, "Bearer token verified");

        Ok(UserContext::from_claims(&claims).with_client_info(ip_address, user_agent))
    }
}
