//! Authorization checks layered on top of a resolved identity.
//!
//! Both gates assume the auth middleware has already produced a user id;
//! they never replace identity resolution.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::auth::UserStore;
use crate::membership::store::MembershipStore;
use crate::model::{MembershipStatus, MembershipView};
use crate::types::UserId;

/// Gate errors.
#[derive(Debug, Clone, PartialEq)]
pub enum GateError {
    /// Authenticated, but without a current membership
    MembershipRequired,
    /// Authenticated, but not an administrator
    AdminRequired,
    /// The identity names a user that no longer exists
    UserNotFound,
    /// Database error
    DatabaseError(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MembershipRequired => write!(f, "Membership required to access this resource"),
            Self::AdminRequired => write!(f, "Admin access required"),
            Self::UserNotFound => write!(f, "User not found"),
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for GateError {}

pub struct MembershipGate {
    users: Arc<UserStore>,
    memberships: Arc<MembershipStore>,
}

impl MembershipGate {
    pub fn new(users: Arc<UserStore>, memberships: Arc<MembershipStore>) -> Self {
        Self { users, memberships }
    }

    /// Allow admins unconditionally, everyone else only with a current
    /// membership on `today`.
    pub async fn check_membership(&self, user_id: &UserId, today: NaiveDate) -> Result<(), GateError> {
        if self.admin_flag(user_id).await? {
            debug!(user_id = %user_id, "Membership gate bypassed for admin");
            return Ok(());
        }

        let has_membership = self
            .memberships
            .has_active_membership(user_id, today)
            .await
            .map_err(|e| GateError::DatabaseError(e.to_string()))?;

        if has_membership {
            Ok(())
        } else {
            debug!(user_id = %user_id, "Membership gate denied");
            Err(GateError::MembershipRequired)
        }
    }

    /// Allow only users carrying the admin flag.
    pub async fn check_admin(&self, user_id: &UserId) -> Result<(), GateError> {
        if self.admin_flag(user_id).await? {
            Ok(())
        } else {
            Err(GateError::AdminRequired)
        }
    }

    /// Membership status as reported to the client.
    ///
    /// `has_membership` mirrors [`check_membership`](Self::check_membership),
    /// so admins report `true` even without a row; `membership` is only set
    /// when a current row exists.
    pub async fn membership_status(&self, user_id: &UserId, today: NaiveDate) -> Result<MembershipStatus, GateError> {
        let is_admin = self.admin_flag(user_id).await?;

        let membership = self
            .memberships
            .active_membership(user_id, today)
            .await
            .map_err(|e| GateError::DatabaseError(e.to_string()))?;

        Ok(MembershipStatus {
            has_membership: is_admin || membership.is_some(),
            membership: membership.as_ref().map(MembershipView::from),
        })
    }

    async fn admin_flag(&self, user_id: &UserId) -> Result<bool, GateError> {
        self.users
            .is_admin(user_id)
            .await
            .map_err(|e| GateError::DatabaseError(e.to_string()))?
            .ok_or(GateError::UserNotFound)
    }
}
