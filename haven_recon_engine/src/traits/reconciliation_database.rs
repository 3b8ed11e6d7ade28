use thiserror::Error;

use crate::{
    db_types::{
        EventStatus,
        NewTransaction,
        NewWebhookEvent,
        Provider,
        StatusChange,
        StatusContext,
        Transaction,
        TransactionStatus,
        WebhookEvent,
    },
    traits::{AuditLogging, ReferralProcessing},
};

/// The storage contract for the reconciliation core.
///
/// The two tables behind this trait — transactions and webhook events — are the only shared
/// mutable state in the system. Backends must satisfy two properties:
///
/// * [`record_event`](Self::record_event) is an atomic insert-if-absent on `(provider, event_id)`.
///   When two deliveries of the same event race, exactly one observes `is_new == true`. This is
///   the sole serialization point for at-most-once side effects.
/// * [`update_transaction_status`](Self::update_transaction_status) only ever moves a transaction
///   out of `Pending`, and reports whether the row actually moved so that callers can suppress
///   duplicate completion side effects.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase: Clone + ReferralProcessing + AuditLogging {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Records an inbound gateway event in the idempotency ledger.
    ///
    /// If no row exists for `(provider, event_id)`, one is inserted with status `pending` and
    /// `is_new` is true. If a row already exists, the existing row is returned unchanged with
    /// `is_new` false — first write wins, always.
    async fn record_event(&self, event: NewWebhookEvent) -> Result<(WebhookEvent, bool), ReconciliationError>;

    /// Resolves a ledger entry after processing, attaching the transaction link and target status
    /// (and the error message, for failures) for later inspection and replay.
    async fn update_event_status(
        &self,
        id: i64,
        status: EventStatus,
        transaction_id: Option<i64>,
        provider_txn_id: Option<&str>,
        target_status: Option<TransactionStatus>,
        error: Option<&str>,
    ) -> Result<WebhookEvent, ReconciliationError>;

    async fn fetch_event(&self, id: i64) -> Result<Option<WebhookEvent>, ReconciliationError>;

    /// Creates a new transaction in `Pending` state. The amount must be strictly positive.
    async fn create_transaction(&self, txn: NewTransaction) -> Result<Transaction, ReconciliationError>;

    async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, ReconciliationError>;

    async fn fetch_transaction_by_provider_txn_id(
        &self,
        provider: Provider,
        provider_txn_id: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Transaction>, ReconciliationError>;

    /// The single mutation entrypoint for transaction status.
    ///
    /// Locates the transaction by `(provider, provider_txn_id)`, scoped to `user_id` when given.
    /// Returns a no-op [`StatusChange`] when the transaction is already in the requested terminal
    /// state, and [`ReconciliationError::InvalidTransition`] when it is in the *other* terminal
    /// state. On success the new status is persisted, `updated_at` is bumped and `ctx` is stamped
    /// into the transaction metadata.
    ///
    /// Implementations must be safe under concurrent invocation: the status write is guarded on
    /// the row still being `Pending`, and a lost race is re-classified by re-reading the row.
    async fn update_transaction_status(
        &self,
        provider: Provider,
        provider_txn_id: &str,
        user_id: Option<&str>,
        new_status: TransactionStatus,
        ctx: &StatusContext,
    ) -> Result<StatusChange, ReconciliationError>;

    /// Backfills the definitive external reference for an on-chain deposit, where the tx hash is
    /// only known after the user deposits. Refuses to overwrite a different existing reference.
    async fn set_provider_txn_id(&self, transaction_id: i64, tx_hash: &str) -> Result<Transaction, ReconciliationError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), ReconciliationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested transaction (internal id {0}) does not exist")]
    TransactionIdNotFound(i64),
    #[error("No transaction matches {0} reference {1}")]
    TransactionNotFound(Provider, String),
    #[error("The requested webhook event {0} does not exist")]
    EventNotFound(i64),
    #[error("Illegal status transition from {from} to {to}")]
    InvalidTransition { from: TransactionStatus, to: TransactionStatus },
    #[error("Transaction amounts must be strictly positive")]
    InvalidAmount,
    #[error("A transaction already carries provider reference {0}")]
    DuplicateProviderTxnId(String),
    #[error("Transaction {0} has no provider reference yet")]
    ProviderTxnIdMissing(i64),
    #[error("Crypto deposits cannot be confirmed manually; use the on-chain verification flow")]
    ManualConfirmForbidden,
    #[error("On-chain verification only applies to crypto transactions, not {0}")]
    OnChainVerifyForbidden(Provider),
    #[error("The requested referral commission {0} does not exist")]
    ReferralNotFound(String),
    #[error("Webhook event {0} has no stored target status or provider reference; it cannot be replayed")]
    EventNotReplayable(i64),
}

impl From<sqlx::Error> for ReconciliationError {
    fn from(e: sqlx::Error) -> Self {
        ReconciliationError::DatabaseError(e.to_string())
    }
}
