use chrono::{DateTime, Utc};
use log::*;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::parse_column;
use crate::{
    db_types::{EventStatus, NewWebhookEvent, Provider, TransactionStatus, WebhookEvent},
    traits::ReconciliationError,
};

impl FromRow<'_, SqliteRow> for WebhookEvent {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let target_raw: Option<String> = row.try_get("target_status")?;
        let target_status = target_raw
            .map(|s| s.parse::<TransactionStatus>())
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode { index: "target_status".to_string(), source: Box::new(e) })?;
        Ok(Self {
            id: row.try_get("id")?,
            provider: parse_column(row, "provider")?,
            event_id: row.try_get("event_id")?,
            event_type: row.try_get("event_type")?,
            status: parse_column(row, "status")?,
            transaction_id: row.try_get("transaction_id")?,
            provider_txn_id: row.try_get("provider_txn_id")?,
            target_status,
            error: row.try_get("error")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

/// Claims an event in the idempotency ledger. First write wins: the insert is atomic on the
/// `(provider, event_id)` unique key, so of two racing deliveries exactly one sees `true` here.
pub async fn idempotent_insert(
    event: NewWebhookEvent,
    conn: &mut SqliteConnection,
) -> Result<(WebhookEvent, bool), ReconciliationError> {
    let inserted: Option<WebhookEvent> = sqlx::query_as(
        r#"
            INSERT INTO webhook_events (provider, event_id, event_type, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, event_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(event.provider.to_string())
    .bind(&event.event_id)
    .bind(&event.event_type)
    .bind(&event.payload)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(record) => {
            debug!("🗃️ Webhook event {}/{} claimed with id {}", event.provider, event.event_id, record.id);
            Ok((record, true))
        },
        None => {
            let existing = fetch_event_by_key(event.provider, &event.event_id, conn).await?.ok_or_else(|| {
                ReconciliationError::DatabaseError(format!(
                    "Conflict on webhook event {}/{} but no existing row found",
                    event.provider, event.event_id
                ))
            })?;
            debug!(
                "🗃️ Webhook event {}/{} was already recorded (id {}, status {})",
                event.provider, event.event_id, existing.id, existing.status
            );
            Ok((existing, false))
        },
    }
}

pub async fn fetch_event(id: i64, conn: &mut SqliteConnection) -> Result<Option<WebhookEvent>, ReconciliationError> {
    let event = sqlx::query_as("SELECT * FROM webhook_events WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(event)
}

pub async fn fetch_event_by_key(
    provider: Provider,
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEvent>, ReconciliationError> {
    let event = sqlx::query_as("SELECT * FROM webhook_events WHERE provider = $1 AND event_id = $2")
        .bind(provider.to_string())
        .bind(event_id)
        .fetch_optional(conn)
        .await?;
    Ok(event)
}

#[allow(clippy::too_many_arguments)]
pub async fn update_event_status(
    id: i64,
    status: EventStatus,
    transaction_id: Option<i64>,
    provider_txn_id: Option<&str>,
    target_status: Option<TransactionStatus>,
    error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<WebhookEvent, ReconciliationError> {
    let updated: Option<WebhookEvent> = sqlx::query_as(
        r#"
            UPDATE webhook_events SET
                status = $1,
                transaction_id = COALESCE($2, transaction_id),
                provider_txn_id = COALESCE($3, provider_txn_id),
                target_status = COALESCE($4, target_status),
                error = $5,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $6
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(transaction_id)
    .bind(provider_txn_id)
    .bind(target_status.map(|s| s.to_string()))
    .bind(error)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    updated.ok_or(ReconciliationError::EventNotFound(id))
}
