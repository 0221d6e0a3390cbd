//! Request and response records exchanged between the portal API and its
//! clients. Field names follow the JSON the browser front end consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{MembershipRecord, UserRecord};
use crate::types::{BearerToken, MembershipId, UserId};

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
}

/// Body of `POST /auth/login`.
///
/// `password` is optional on the wire so that an absent password is reported
/// as a validation error instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Token plus a summary of the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: BearerToken,
    pub user: UserSummary,
}

/// User summary returned by register and login.
///
/// Register returns only the identity fields; login adds the academic fields
/// and the admin flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

impl UserSummary {
    /// Identity-only summary, as returned right after registration.
    pub fn registered(user: &UserRecord) -> Self {
        Self {
            id: user.uid.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            graduation_year: None,
            major: None,
            is_admin: None,
        }
    }

    /// Full summary, as returned by login.
    pub fn logged_in(user: &UserRecord) -> Self {
        Self {
            graduation_year: user.graduation_year,
            major: user.major.clone(),
            is_admin: Some(user.is_admin),
            ..Self::registered(user)
        }
    }
}

/// Profile returned by `GET /auth/me`.
///
/// `has_membership` is never sent by the server; clients merge it in after a
/// membership check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub graduation_year: Option<i32>,
    pub major: Option<String>,
    pub profile_image_url: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_membership: Option<bool>,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.uid.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            graduation_year: user.graduation_year,
            major: user.major.clone(),
            profile_image_url: user.profile_image_url.clone(),
            job_title: user.job_title.clone(),
            company: user.company.clone(),
            location: user.location.clone(),
            is_admin: user.is_admin,
            has_membership: None,
        }
    }
}

/// Public directory entry. Never carries credentials or the admin flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub graduation_year: Option<i32>,
    pub major: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
}

impl From<&UserRecord> for DirectoryEntry {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.uid.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            graduation_year: user.graduation_year,
            major: user.major.clone(),
            job_title: user.job_title.clone(),
            company: user.company.clone(),
            location: user.location.clone(),
        }
    }
}

/// Body of `POST /memberships`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPurchase {
    pub membership_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount_paid: f64,
}

/// Membership as exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipView {
    pub id: MembershipId,
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub membership_type: String,
    pub payment_id: Option<String>,
    pub amount_paid: f64,
    pub is_active: bool,
}

impl From<&MembershipRecord> for MembershipView {
    fn from(m: &MembershipRecord) -> Self {
        Self {
            id: m.mid.clone(),
            user_id: m.user_id.clone(),
            start_date: m.start_date,
            end_date: m.end_date,
            membership_type: m.membership_type.clone(),
            payment_id: m.payment_id.clone(),
            amount_paid: m.amount_paid,
            is_active: m.is_active,
        }
    }
}

/// Body of `GET /memberships/my-membership`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipStatus {
    pub has_membership: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<MembershipView>,
}

/// Active membership count for one membership type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub membership_type: String,
    pub count: u64,
}

/// Body of `GET /memberships/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipStats {
    pub by_type: Vec<TypeCount>,
    pub active_memberships: u64,
    pub expiring_memberships: u64,
    pub total_revenue: f64,
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}
