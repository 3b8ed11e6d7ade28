use chrono::Utc;
use haven_recon_engine::{
    db_types::{
        EventStatus,
        NewAuditEvent,
        NewTransaction,
        NewWebhookEvent,
        Provider,
        ReferralCommission,
        RelatedObject,
        StatusChange,
        StatusContext,
        Transaction,
        TransactionStatus,
        TransactionType,
        WebhookEvent,
    },
    traits::{AuditLogging, ReconciliationDatabase, ReconciliationError, ReferralProcessing},
};
use hps_common::Money;
use mockall::mock;

mock! {
    pub ReconDb {}
    impl Clone for ReconDb {
        fn clone(&self) -> Self;
    }
    impl ReconciliationDatabase for ReconDb {
        fn url(&self) -> &str;
        async fn record_event(&self, event: NewWebhookEvent) -> Result<(WebhookEvent, bool), ReconciliationError>;
        async fn update_event_status<'a, 'b>(
            &self,
            id: i64,
            status: EventStatus,
            transaction_id: Option<i64>,
            provider_txn_id: Option<&'a str>,
            target_status: Option<TransactionStatus>,
            error: Option<&'b str>,
        ) -> Result<WebhookEvent, ReconciliationError>;
        async fn fetch_event(&self, id: i64) -> Result<Option<WebhookEvent>, ReconciliationError>;
        async fn create_transaction(&self, txn: NewTransaction) -> Result<Transaction, ReconciliationError>;
        async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, ReconciliationError>;
        async fn fetch_transaction_by_provider_txn_id<'a>(
            &self,
            provider: Provider,
            provider_txn_id: &str,
            user_id: Option<&'a str>,
        ) -> Result<Option<Transaction>, ReconciliationError>;
        async fn update_transaction_status<'a>(
            &self,
            provider: Provider,
            provider_txn_id: &str,
            user_id: Option<&'a str>,
            new_status: TransactionStatus,
            ctx: &StatusContext,
        ) -> Result<StatusChange, ReconciliationError>;
        async fn set_provider_txn_id(&self, transaction_id: i64, tx_hash: &str) -> Result<Transaction, ReconciliationError>;
        async fn close(&mut self) -> Result<(), ReconciliationError>;
    }
    impl ReferralProcessing for ReconDb {
        async fn process_commission_for_referral(&self, referral_id: &str) -> Result<ReferralCommission, ReconciliationError>;
        async fn fetch_commission(&self, referral_id: &str) -> Result<Option<ReferralCommission>, ReconciliationError>;
    }
    impl AuditLogging for ReconDb {
        async fn append_audit_event(&self, event: NewAuditEvent) -> Result<(), ReconciliationError>;
    }
}

pub fn transaction(id: i64, provider: Provider, status: TransactionStatus) -> Transaction {
    Transaction {
        id,
        user_id: Some("user_1".to_string()),
        txn_type: TransactionType::Deposit,
        amount: Money::from_units(100),
        currency: "USD".to_string(),
        status,
        provider,
        provider_txn_id: Some(format!("ref_{id}")),
        related_object: RelatedObject::None,
        metadata: serde_json::json!({}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn webhook_event(id: i64, provider: Provider, status: EventStatus) -> WebhookEvent {
    WebhookEvent {
        id,
        provider,
        event_id: format!("evt_{id}"),
        event_type: "payment_intent.succeeded".to_string(),
        status,
        transaction_id: None,
        provider_txn_id: None,
        target_status: None,
        error: None,
        payload: "{}".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
