//! Membership rows: dated entitlements per user.

use anyhow::Result;
use chrono::NaiveDate;

use crate::db::Db;
use crate::db::schema::{MembershipCreate, MembershipRecord};
use crate::types::{MembershipId, UserId};

/// Membership store for database operations.
pub struct MembershipStore {
    db: Db,
}

impl MembershipStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The current membership with the latest end date, if any.
    ///
    /// A row is current iff it is flagged active and its end date is on or
    /// after `today`.
    pub async fn active_membership(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<Option<MembershipRecord>> {
        let query = r#"
            SELECT * FROM membership
            WHERE user_id = $user_id
              AND is_active = true
              AND end_date >= $today
            ORDER BY end_date DESC
            LIMIT 1
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("user_id", user_id.clone()))
            .bind(("today", today))
            .await?;

        let rows: Vec<MembershipRecord> = res.take(0)?;
        Ok(rows.into_iter().next())
    }

    pub async fn has_active_membership(&self, user_id: &UserId, today: NaiveDate) -> Result<bool> {
        Ok(self.active_membership(user_id, today).await?.is_some())
    }

    pub async fn create_membership(&self, create: &MembershipCreate) -> Result<MembershipRecord> {
        let query = r#"
            CREATE membership CONTENT {
                mid: $mid,
                user_id: $user_id,
                start_date: $start_date,
                end_date: $end_date,
                membership_type: $membership_type,
                payment_id: $payment_id,
                amount_paid: $amount_paid,
                is_active: $is_active
            }
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("mid", MembershipId::generate()))
            .bind(("user_id", create.user_id.clone()))
            .bind(("start_date", create.start_date))
            .bind(("end_date", create.end_date))
            .bind(("membership_type", create.membership_type.clone()))
            .bind(("payment_id", create.payment_id.clone()))
            .bind(("amount_paid", create.amount_paid))
            .bind(("is_active", create.is_active))
            .await?;

        let rows: Vec<MembershipRecord> = res.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to create membership"))
    }

    pub async fn get_membership(&self, membership_id: &MembershipId) -> Result<Option<MembershipRecord>> {
        let query = "SELECT * FROM membership WHERE mid = $mid LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("mid", membership_id.clone()))
            .await?;

        let rows: Vec<MembershipRecord> = res.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Clear the active flag. The row itself is kept.
    pub async fn deactivate_membership(&self, membership_id: &MembershipId) -> Result<Option<MembershipRecord>> {
        let query = "UPDATE membership SET is_active = false WHERE mid = $mid";

        let mut res = self
            .db
            .query(query)
            .bind(("mid", membership_id.clone()))
            .await?;

        let rows: Vec<MembershipRecord> = res.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Every membership row, newest end date first.
    pub async fn list_memberships(&self) -> Result<Vec<MembershipRecord>> {
        let query = "SELECT * FROM membership ORDER BY end_date DESC";

        let mut res = self.db.query(query).await?;
        let rows: Vec<MembershipRecord> = res.take(0)?;
        Ok(rows)
    }
}
