//! User context for request-scoped identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::token::Claims;
use crate::types::UserId;

/// Identity attached to a request once its bearer token has been verified.
///
/// This struct is inserted into the request extensions by the auth
/// middleware and read by downstream handlers and gates. It is immutable
/// once created. It only records what the token says: whether the user row
/// still exists is for the consumer to decide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    /// User identifier decoded from the token
    user_id: UserId,
    /// When the presented token stops being accepted
    expires_at: Option<DateTime<Utc>>,
    /// Client IP address (for audit logging)
    ip_address: Option<String>,
    /// Client user agent (for audit logging)
    user_agent: Option<String>,
}

impl UserContext {
    /// Create a new user context.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            expires_at: None,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Build the context from verified token claims.
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            expires_at: DateTime::from_timestamp(claims.exp, 0),
            ..Self::new(claims.user_id())
        }
    }

    /// Set client metadata for audit logging.
    pub fn with_client_info(
        mut self,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// Get the user ID.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Get the client IP address for audit logging.
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Get the client user agent for audit logging.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}
