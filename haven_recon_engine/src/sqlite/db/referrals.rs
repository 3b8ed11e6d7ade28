use chrono::{DateTime, Utc};
use log::*;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use crate::{db_types::ReferralCommission, traits::ReconciliationError};

impl FromRow<'_, SqliteRow> for ReferralCommission {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            referral_id: row.try_get("referral_id")?,
            transaction_id: row.try_get("transaction_id")?,
            status: row.try_get("status")?,
            commission_amount: row.try_get("commission_amount")?,
            commission_paid: row.try_get("commission_paid")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

pub async fn fetch_commission(
    referral_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ReferralCommission>, ReconciliationError> {
    let commission = sqlx::query_as("SELECT * FROM referral_commissions WHERE referral_id = $1")
        .bind(referral_id)
        .fetch_optional(conn)
        .await?;
    Ok(commission)
}

/// Marks the commission for the referral as processed and paid. Safe to call more than once; the
/// second call finds the row already in its final shape.
pub async fn process_commission(
    referral_id: &str,
    conn: &mut SqliteConnection,
) -> Result<ReferralCommission, ReconciliationError> {
    let updated: Option<ReferralCommission> = sqlx::query_as(
        r#"
            UPDATE referral_commissions
            SET status = 'processed', commission_paid = 1, updated_at = CURRENT_TIMESTAMP
            WHERE referral_id = $1
            RETURNING *;
        "#,
    )
    .bind(referral_id)
    .fetch_optional(conn)
    .await?;
    let commission = updated.ok_or_else(|| ReconciliationError::ReferralNotFound(referral_id.to_string()))?;
    debug!("🗃️ Referral commission {referral_id} marked as processed ({})", commission.commission_amount);
    Ok(commission)
}
