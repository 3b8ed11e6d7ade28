use chrono::{DateTime, Utc};
use log::*;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::parse_column;
use crate::{
    db_types::{NewTransaction, Provider, RelatedObject, StatusChange, StatusContext, Transaction, TransactionStatus},
    traits::ReconciliationError,
};

impl FromRow<'_, SqliteRow> for Transaction {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let related_raw: String = row.try_get("related_object")?;
        let related_object: RelatedObject = serde_json::from_str(&related_raw)
            .map_err(|e| sqlx::Error::ColumnDecode { index: "related_object".to_string(), source: Box::new(e) })?;
        let metadata_raw: String = row.try_get("metadata")?;
        let metadata: serde_json::Value = serde_json::from_str(&metadata_raw)
            .map_err(|e| sqlx::Error::ColumnDecode { index: "metadata".to_string(), source: Box::new(e) })?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            txn_type: parse_column(row, "txn_type")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            status: parse_column(row, "status")?,
            provider: parse_column(row, "provider")?,
            provider_txn_id: row.try_get("provider_txn_id")?,
            related_object,
            metadata,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

pub async fn insert_transaction(
    txn: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<Transaction, ReconciliationError> {
    if !txn.amount.is_positive() {
        return Err(ReconciliationError::InvalidAmount);
    }
    let related = serde_json::to_string(&txn.related_object)
        .map_err(|e| ReconciliationError::DatabaseError(e.to_string()))?;
    let result = sqlx::query_as(
        r#"
            INSERT INTO transactions (user_id, txn_type, amount, currency, provider, provider_txn_id, related_object)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(txn.user_id)
    .bind(txn.txn_type.to_string())
    .bind(txn.amount.value())
    .bind(txn.currency)
    .bind(txn.provider.to_string())
    .bind(txn.provider_txn_id.clone())
    .bind(related)
    .fetch_one(conn)
    .await;
    match result {
        Ok(txn) => Ok(txn),
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
            Err(ReconciliationError::DuplicateProviderTxnId(txn.provider_txn_id.unwrap_or_default()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_transaction_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, ReconciliationError> {
    let txn = sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(txn)
}

/// Locates a transaction by its gateway reference, optionally scoped to a user. Admin and webhook
/// paths pass `None` for the user and match globally.
pub async fn fetch_transaction_by_provider_txn_id(
    provider: Provider,
    provider_txn_id: &str,
    user_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, ReconciliationError> {
    let txn = match user_id {
        Some(uid) => {
            sqlx::query_as("SELECT * FROM transactions WHERE provider = $1 AND provider_txn_id = $2 AND user_id = $3")
                .bind(provider.to_string())
                .bind(provider_txn_id)
                .bind(uid)
                .fetch_optional(conn)
                .await?
        },
        None => sqlx::query_as("SELECT * FROM transactions WHERE provider = $1 AND provider_txn_id = $2")
            .bind(provider.to_string())
            .bind(provider_txn_id)
            .fetch_optional(conn)
            .await?,
    };
    Ok(txn)
}

/// Applies a terminal status to a pending transaction.
///
/// The UPDATE is guarded on `status = 'pending'` so that two racing callers cannot both move the
/// row; the loser re-reads the row and is classified as either an idempotent no-op (same terminal
/// state) or an [`ReconciliationError::InvalidTransition`] (conflicting terminal state).
pub async fn update_status(
    provider: Provider,
    provider_txn_id: &str,
    user_id: Option<&str>,
    new_status: TransactionStatus,
    ctx: &StatusContext,
    conn: &mut SqliteConnection,
) -> Result<StatusChange, ReconciliationError> {
    let txn = fetch_transaction_by_provider_txn_id(provider, provider_txn_id, user_id, &mut *conn)
        .await?
        .ok_or_else(|| ReconciliationError::TransactionNotFound(provider, provider_txn_id.to_string()))?;
    if txn.status == new_status {
        debug!("🗃️ Transaction #{} is already {new_status}. Nothing to do.", txn.id);
        return Ok(StatusChange { transaction: txn, applied: false });
    }
    if txn.status.is_terminal() {
        return Err(ReconciliationError::InvalidTransition { from: txn.status, to: new_status });
    }
    let metadata = stamp_context(&txn.metadata, ctx);
    let updated: Option<Transaction> = sqlx::query_as(
        r#"
            UPDATE transactions SET status = $1, metadata = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(new_status.to_string())
    .bind(metadata)
    .bind(txn.id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(transaction) => {
            debug!("🗃️ Transaction #{} moved from pending to {new_status} via {}", transaction.id, ctx.source);
            Ok(StatusChange { transaction, applied: true })
        },
        None => {
            // Lost a race on the row itself. Re-read and classify.
            let current = fetch_transaction_by_id(txn.id, conn)
                .await?
                .ok_or(ReconciliationError::TransactionIdNotFound(txn.id))?;
            classify_lost_race(current, new_status)
        },
    }
}

/// Classifies the loser of a status-update race. Converging on the same terminal state is an
/// idempotent no-op; a conflicting terminal state is an integrity error and is rejected.
fn classify_lost_race(
    current: Transaction,
    new_status: TransactionStatus,
) -> Result<StatusChange, ReconciliationError> {
    if current.status == new_status {
        debug!("🗃️ Transaction #{} reached {new_status} concurrently. Treating as a no-op.", current.id);
        Ok(StatusChange { transaction: current, applied: false })
    } else {
        Err(ReconciliationError::InvalidTransition { from: current.status, to: new_status })
    }
}

/// Backfills the provider reference for an on-chain deposit. A different pre-existing reference is
/// an integrity problem and is rejected.
pub async fn set_provider_txn_id(
    transaction_id: i64,
    tx_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<Transaction, ReconciliationError> {
    let txn = fetch_transaction_by_id(transaction_id, &mut *conn)
        .await?
        .ok_or(ReconciliationError::TransactionIdNotFound(transaction_id))?;
    match txn.provider_txn_id.as_deref() {
        Some(existing) if existing == tx_hash => return Ok(txn),
        Some(existing) => {
            warn!("🗃️ Transaction #{transaction_id} already has reference {existing}; refusing to replace it");
            return Err(ReconciliationError::DuplicateProviderTxnId(existing.to_string()));
        },
        None => {},
    }
    let result = sqlx::query_as(
        "UPDATE transactions SET provider_txn_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(tx_hash)
    .bind(transaction_id)
    .fetch_one(conn)
    .await;
    match result {
        Ok(txn) => Ok(txn),
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
            Err(ReconciliationError::DuplicateProviderTxnId(tx_hash.to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

/// Merges the status-change context into the transaction metadata under `status_context`, for
/// audit traceability. Amount and the rest of the record are untouched.
fn stamp_context(metadata: &serde_json::Value, ctx: &StatusContext) -> String {
    let mut meta = match metadata {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    let ctx_value = serde_json::to_value(ctx).unwrap_or(serde_json::Value::Null);
    meta.insert("status_context".to_string(), ctx_value);
    serde_json::Value::Object(meta).to_string()
}
