use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::{RecordId, sql::Datetime};

use crate::types::{MembershipId, UserId};

/// Persisted user row in the credential store (table: `user`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Database identifier
    pub id: RecordId,
    /// Stable public identifier, carried in tokens
    pub uid: UserId,
    /// Canonical (trimmed, lowercased) email, unique
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub graduation_year: Option<i32>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub graduation_year: Option<i32>,
    pub major: Option<String>,
    pub is_admin: bool,
}

/// Persisted membership row (table: `membership`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// Database identifier
    pub id: RecordId,
    /// Stable public identifier
    pub mid: MembershipId,
    /// Owning user
    pub user_id: UserId,
    pub start_date: NaiveDate,
    /// Last day (inclusive) on which the membership is valid
    pub end_date: NaiveDate,
    pub membership_type: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount_paid: f64,
    pub is_active: bool,
}

impl MembershipRecord {
    /// Whether this row grants access on `today`.
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.is_active && self.end_date >= today
    }
}

/// Payload for creating a membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipCreate {
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub membership_type: String,
    pub payment_id: Option<String>,
    pub amount_paid: f64,
    pub is_active: bool,
}

/// Kinds of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Account created
    Register,
    /// Credentials accepted
    Login,
    /// Membership purchased
    MembershipCreated,
    /// Membership cancelled by its owner or an admin
    MembershipCancelled,
    /// Admin flag granted from the command line
    AdminGranted,
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::MembershipCreated => "membership_created",
            Self::MembershipCancelled => "membership_cancelled",
            Self::AdminGranted => "admin_granted",
        }
    }
}

/// Persisted audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    /// Database identifier
    pub id: RecordId,
    /// Acting user
    pub user_id: Option<String>,
    /// The action that was performed
    pub action: String,
    /// Type of resource affected
    pub resource_type: String,
    /// ID of the affected resource
    pub resource_id: Option<String>,
    /// Additional details
    pub details: Option<Value>,
    /// When the entry was written
    pub created_at: Option<Datetime>,
}

/// Payload for creating an audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogCreate {
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<Value>,
}
