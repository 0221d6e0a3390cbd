//! Membership purchase, cancellation and reporting.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Days, Months, NaiveDate};
use tracing::{info, warn};

use crate::auth::{UserContext, UserStore};
use crate::db::schema::{AuditAction, AuditLogCreate, MembershipCreate, MembershipRecord};
use crate::membership::store::MembershipStore;
use crate::model::{MembershipPurchase, MembershipStats, MembershipView, TypeCount};
use crate::types::MembershipId;

/// Window, in days, within which a current membership counts as expiring.
pub const EXPIRING_WINDOW_DAYS: u64 = 30;

/// Purchasable membership plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipType {
    Monthly,
    Annual,
    Lifetime,
}

impl MembershipType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
            Self::Lifetime => "lifetime",
        }
    }

    /// Last valid day of a membership of this type starting on `start`.
    pub fn end_date(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Monthly => start.checked_add_days(Days::new(30)),
            Self::Annual => start.checked_add_months(Months::new(12)),
            Self::Lifetime => start.checked_add_months(Months::new(99 * 12)),
        }
    }
}

impl FromStr for MembershipType {
    type Err = MembershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "annual" => Ok(Self::Annual),
            "lifetime" => Ok(Self::Lifetime),
            _ => Err(MembershipError::InvalidType),
        }
    }
}

/// Membership management errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipError {
    AlreadyActive,
    InvalidType,
    NotFound,
    NotOwner,
    DatabaseError(String),
}

impl fmt::Display for MembershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "You already have an active membership"),
            Self::InvalidType => write!(f, "Invalid membership type"),
            Self::NotFound => write!(f, "Membership not found"),
            Self::NotOwner => write!(f, "Not authorized to cancel this membership"),
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for MembershipError {}

impl From<anyhow::Error> for MembershipError {
    fn from(e: anyhow::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

pub struct MembershipService {
    memberships: Arc<MembershipStore>,
    users: Arc<UserStore>,
}

impl MembershipService {
    pub fn new(memberships: Arc<MembershipStore>, users: Arc<UserStore>) -> Self {
        Self { memberships, users }
    }

    /// Start a membership for `user_id` on `today`.
    pub async fn purchase(
        &self,
        requester: &UserContext,
        purchase: &MembershipPurchase,
        today: NaiveDate,
    ) -> Result<MembershipView, MembershipError> {
        let user_id = requester.user_id();
        if self.memberships.has_active_membership(user_id, today).await? {
            return Err(MembershipError::AlreadyActive);
        }

        let kind: MembershipType = purchase.membership_type.parse()?;
        let end_date = kind.end_date(today).ok_or(MembershipError::InvalidType)?;

        let record = self
            .memberships
            .create_membership(&MembershipCreate {
                user_id: user_id.clone(),
                start_date: today,
                end_date,
                membership_type: kind.as_str().to_string(),
                payment_id: purchase.payment_id.clone(),
                amount_paid: purchase.amount_paid,
                is_active: true,
            })
            .await?;

        info!(user_id = %user_id, membership_id = %record.mid, kind = kind.as_str(), "Membership created");
        self.audit(requester, &record, AuditAction::MembershipCreated).await;

        Ok(MembershipView::from(&record))
    }

    /// Deactivate a membership; only its owner or an admin may do so.
    pub async fn cancel(
        &self,
        requester: &UserContext,
        requester_is_admin: bool,
        membership_id: &MembershipId,
    ) -> Result<MembershipView, MembershipError> {
        let existing = self
            .memberships
            .get_membership(membership_id)
            .await?
            .ok_or(MembershipError::NotFound)?;

        if &existing.user_id != requester.user_id() && !requester_is_admin {
            return Err(MembershipError::NotOwner);
        }

        let updated = self
            .memberships
            .deactivate_membership(membership_id)
            .await?
            .ok_or(MembershipError::NotFound)?;

        info!(user_id = %requester.user_id(), membership_id = %membership_id, "Membership cancelled");
        self.audit(requester, &updated, AuditAction::MembershipCancelled).await;

        Ok(MembershipView::from(&updated))
    }

    pub async fn list(&self) -> Result<Vec<MembershipView>, MembershipError> {
        Ok(self
            .memberships
            .list_memberships()
            .await?
            .iter()
            .map(MembershipView::from)
            .collect())
    }

    /// Aggregate figures over all memberships as of `today`.
    pub async fn stats(&self, today: NaiveDate) -> Result<MembershipStats, MembershipError> {
        let rows = self.memberships.list_memberships().await?;
        Ok(compute_stats(&rows, today))
    }

    async fn audit(&self, requester: &UserContext, record: &MembershipRecord, action: AuditAction) {
        let user_id = requester.user_id();
        let entry = AuditLogCreate {
            user_id: Some(user_id.to_string()),
            action: action.as_str().to_string(),
            resource_type: "membership".to_string(),
            resource_id: Some(record.mid.to_string()),
            details: Some(serde_json::json!({
                "membership_type": record.membership_type,
                "end_date": record.end_date,
                "ip_address": requester.ip_address(),
                "user_agent": requester.user_agent(),
            })),
        };
        if let Err(e) = self.users.audit_log(entry).await {
            warn!(user_id = %user_id, "Failed to write audit entry: {}", e);
        }
    }
}

fn compute_stats(rows: &[MembershipRecord], today: NaiveDate) -> MembershipStats {
    let expiring_cutoff = today
        .checked_add_days(Days::new(EXPIRING_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MAX);

    let mut by_type: Vec<TypeCount> = Vec::new();
    let mut active = 0;
    let mut expiring = 0;

    for row in rows.iter().filter(|r| r.is_current(today)) {
        active += 1;
        if row.end_date <= expiring_cutoff {
            expiring += 1;
        }
        match by_type.iter_mut().find(|t| t.membership_type == row.membership_type) {
            Some(entry) => entry.count += 1,
            None => by_type.push(TypeCount {
                membership_type: row.membership_type.clone(),
                count: 1,
            }),
        }
    }
    by_type.sort_by(|a, b| a.membership_type.cmp(&b.membership_type));

    MembershipStats {
        by_type,
        active_memberships: active,
        expiring_memberships: expiring,
        total_revenue: rows.iter().map(|r| r.amount_paid).sum(),
    }
}
