use std::fmt::Display;

use haven_recon_engine::db_types::{NewTransaction, Provider, RelatedObject, TransactionType};
use hps_common::Money;
use serde::{Deserialize, Serialize};

/// The acknowledgement body every webhook endpoint returns on acceptance. Gateways only care about the
/// status code, but a stable body makes their delivery logs legible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransactionRequest {
    pub user_id: Option<String>,
    pub txn_type: TransactionType,
    pub amount: Money,
    pub currency: String,
    pub provider: Provider,
    pub provider_txn_id: Option<String>,
    #[serde(default)]
    pub related_object: RelatedObject,
}

impl From<NewTransactionRequest> for NewTransaction {
    fn from(req: NewTransactionRequest) -> Self {
        let mut txn = NewTransaction::new(req.txn_type, req.amount, &req.currency, req.provider)
            .with_related_object(req.related_object);
        if let Some(user_id) = req.user_id {
            txn = txn.for_user(&user_id);
        }
        if let Some(provider_txn_id) = req.provider_txn_id {
            txn = txn.with_provider_txn_id(&provider_txn_id);
        }
        txn
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnChainDepositRequest {
    pub transaction_id: i64,
    pub tx_hash: String,
}

/// Replay request for a stored webhook event. `action` exists so the endpoint can grow more verbs later
/// without a wire change; only "reprocess" is accepted today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessRequest {
    pub id: i64,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryReferralRequest {
    pub referral_id: String,
    pub action: String,
}
