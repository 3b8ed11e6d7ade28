use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use crate::{
    db_types::{
        EventStatus,
        NewAuditEvent,
        NewTransaction,
        NewWebhookEvent,
        Provider,
        ReferralCommission,
        StatusChange,
        StatusContext,
        Transaction,
        TransactionStatus,
        WebhookEvent,
    },
    sqlite::{
        db::{audit, events, referrals, transactions},
        new_pool,
        run_migrations,
    },
    traits::{AuditLogging, ReconciliationDatabase, ReconciliationError, ReferralProcessing},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, ReconciliationError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub async fn migrate(&self) -> Result<(), ReconciliationError> {
        run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn record_event(&self, event: NewWebhookEvent) -> Result<(WebhookEvent, bool), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        events::idempotent_insert(event, &mut conn).await
    }

    async fn update_event_status(
        &self,
        id: i64,
        status: EventStatus,
        transaction_id: Option<i64>,
        provider_txn_id: Option<&str>,
        target_status: Option<TransactionStatus>,
        error: Option<&str>,
    ) -> Result<WebhookEvent, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        events::update_event_status(id, status, transaction_id, provider_txn_id, target_status, error, &mut conn).await
    }

    async fn fetch_event(&self, id: i64) -> Result<Option<WebhookEvent>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        events::fetch_event(id, &mut conn).await
    }

    async fn create_transaction(&self, txn: NewTransaction) -> Result<Transaction, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let txn = transactions::insert_transaction(txn, &mut conn).await?;
        debug!("🗃️ Transaction #{} created ({} {} via {})", txn.id, txn.amount, txn.currency, txn.provider);
        Ok(txn)
    }

    async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transaction_by_id(id, &mut conn).await
    }

    async fn fetch_transaction_by_provider_txn_id(
        &self,
        provider: Provider,
        provider_txn_id: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Transaction>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transaction_by_provider_txn_id(provider, provider_txn_id, user_id, &mut conn).await
    }

    async fn update_transaction_status(
        &self,
        provider: Provider,
        provider_txn_id: &str,
        user_id: Option<&str>,
        new_status: TransactionStatus,
        ctx: &StatusContext,
    ) -> Result<StatusChange, ReconciliationError> {
        // Autocommit on purpose. The guarded UPDATE is atomic on its own, and holding a read
        // snapshot across it would turn a lost row race into a busy error instead of letting
        // `update_status` re-read and classify it.
        let mut conn = self.pool.acquire().await?;
        transactions::update_status(provider, provider_txn_id, user_id, new_status, ctx, &mut conn).await
    }

    async fn set_provider_txn_id(&self, transaction_id: i64, tx_hash: &str) -> Result<Transaction, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let txn = transactions::set_provider_txn_id(transaction_id, tx_hash, &mut tx).await?;
        tx.commit().await?;
        Ok(txn)
    }

    async fn close(&mut self) -> Result<(), ReconciliationError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ReferralProcessing for SqliteDatabase {
    async fn process_commission_for_referral(
        &self,
        referral_id: &str,
    ) -> Result<ReferralCommission, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let commission = referrals::process_commission(referral_id, &mut tx).await?;
        tx.commit().await?;
        Ok(commission)
    }

    async fn fetch_commission(&self, referral_id: &str) -> Result<Option<ReferralCommission>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        referrals::fetch_commission(referral_id, &mut conn).await
    }
}

impl AuditLogging for SqliteDatabase {
    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<(), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        audit::append(event, &mut conn).await
    }
}
