use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use hps_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value in database column: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------      Provider       ---------------------------------------------------------
/// The source of truth for a payment: an external gateway, the on-chain crypto flow, or a manual admin entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Paystack,
    PayPal,
    Crypto,
    Manual,
}

impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Stripe => write!(f, "stripe"),
            Provider::Paystack => write!(f, "paystack"),
            Provider::PayPal => write!(f, "paypal"),
            Provider::Crypto => write!(f, "crypto"),
            Provider::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for Provider {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Self::Stripe),
            "paystack" => Ok(Self::Paystack),
            "paypal" => Ok(Self::PayPal),
            "crypto" => Ok(Self::Crypto),
            "manual" => Ok(Self::Manual),
            s => Err(ConversionError(format!("Invalid provider: {s}"))),
        }
    }
}

//--------------------------------------   TransactionType    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Investment,
    Payout,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdrawal => write!(f, "withdrawal"),
            TransactionType::Investment => write!(f, "investment"),
            TransactionType::Payout => write!(f, "payout"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "investment" => Ok(Self::Investment),
            "payout" => Ok(Self::Payout),
            s => Err(ConversionError(format!("Invalid transaction type: {s}"))),
        }
    }
}

//--------------------------------------  TransactionStatus   --------------------------------------------------------
/// The transaction state machine. `Pending` may move to either terminal state exactly once;
/// terminal states absorb repeats of themselves and reject the opposite terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------    RelatedObject     --------------------------------------------------------
/// An optional link from a transaction to another platform entity.
///
/// Modelled as a tagged enum rather than loose JSON so that side-effect dispatch on completion is
/// exhaustive. Stored in the database as a JSON blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelatedObject {
    #[default]
    None,
    ReferralCommission {
        referral_id: String,
    },
}

impl RelatedObject {
    pub fn referral_id(&self) -> Option<&str> {
        match self {
            RelatedObject::ReferralCommission { referral_id } => Some(referral_id.as_str()),
            RelatedObject::None => None,
        }
    }
}

//--------------------------------------     Transaction      --------------------------------------------------------
/// A ledger entry. Financial records are never deleted; the only mutable fields are `status`,
/// `provider_txn_id` (backfilled for on-chain deposits) and `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: Option<String>,
    pub txn_type: TransactionType,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    pub provider: Provider,
    pub provider_txn_id: Option<String>,
    pub related_object: RelatedObject,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    NewTransaction    --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: Option<String>,
    pub txn_type: TransactionType,
    /// Must be strictly positive. Immutable after creation.
    pub amount: Money,
    pub currency: String,
    pub provider: Provider,
    /// The gateway's reference for this payment. May be absent at creation time for on-chain
    /// deposits, where the tx hash is only known after the user deposits.
    pub provider_txn_id: Option<String>,
    #[serde(default)]
    pub related_object: RelatedObject,
}

impl NewTransaction {
    pub fn new(txn_type: TransactionType, amount: Money, currency: &str, provider: Provider) -> Self {
        Self {
            user_id: None,
            txn_type,
            amount,
            currency: currency.to_string(),
            provider,
            provider_txn_id: None,
            related_object: RelatedObject::None,
        }
    }

    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_provider_txn_id(mut self, provider_txn_id: &str) -> Self {
        self.provider_txn_id = Some(provider_txn_id.to_string());
        self
    }

    pub fn with_related_object(mut self, related_object: RelatedObject) -> Self {
        self.related_object = related_object;
        self
    }
}

//--------------------------------------     EventStatus      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Processed,
    Failed,
    Reprocessed,
}

impl Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Processed => write!(f, "processed"),
            EventStatus::Failed => write!(f, "failed"),
            EventStatus::Reprocessed => write!(f, "reprocessed"),
        }
    }
}

impl FromStr for EventStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            "reprocessed" => Ok(Self::Reprocessed),
            s => Err(ConversionError(format!("Invalid event status: {s}"))),
        }
    }
}

//--------------------------------------     WebhookEvent     --------------------------------------------------------
/// A row in the idempotency ledger. `(provider, event_id)` is unique; the first delivery wins and
/// all later deliveries observe the existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub provider: Provider,
    pub event_id: String,
    pub event_type: String,
    pub status: EventStatus,
    pub transaction_id: Option<i64>,
    pub provider_txn_id: Option<String>,
    pub target_status: Option<TransactionStatus>,
    pub error: Option<String>,
    /// The raw event body, retained for diagnostics and admin replay.
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub provider: Provider,
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
}

//--------------------------------------     PaymentEvent     --------------------------------------------------------
/// The canonical, gateway-agnostic form of a webhook notification. Gateway payloads are decoded
/// into this at the HTTP boundary so the state machine never branches on provider-specific JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub provider: Provider,
    /// The gateway's stable event identifier. Never a payload hash: gateways redeliver with the
    /// same id but the body is not guaranteed to be byte-identical.
    pub event_id: String,
    pub event_type: String,
    pub provider_txn_id: String,
    pub outcome: EventOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Success,
    Failure,
}

impl PaymentEvent {
    pub fn target_status(&self) -> TransactionStatus {
        match self.outcome {
            EventOutcome::Success => TransactionStatus::Completed,
            EventOutcome::Failure => TransactionStatus::Failed,
        }
    }
}

//--------------------------------------    StatusContext     --------------------------------------------------------
/// Where a status change came from. Stamped into the transaction's metadata for audit traceability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    GatewayWebhook,
    ManualConfirm,
    GatewayVerify,
}

impl Display for StatusSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusSource::GatewayWebhook => write!(f, "gateway_webhook"),
            StatusSource::ManualConfirm => write!(f, "manual_confirm"),
            StatusSource::GatewayVerify => write!(f, "gateway_verify"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusContext {
    pub source: StatusSource,
    /// The gateway or flow that produced the change, e.g. "stripe" or "crypto".
    pub method: String,
    /// Cross-reference to the idempotency ledger entry or deterministic admin key.
    pub idempotency_key: Option<String>,
    pub note: Option<String>,
}

impl StatusContext {
    pub fn gateway(provider: Provider, idempotency_key: &str) -> Self {
        Self {
            source: StatusSource::GatewayWebhook,
            method: provider.to_string(),
            idempotency_key: Some(idempotency_key.to_string()),
            note: None,
        }
    }

    pub fn manual(idempotency_key: &str, note: Option<String>) -> Self {
        Self {
            source: StatusSource::ManualConfirm,
            method: "manual".to_string(),
            idempotency_key: Some(idempotency_key.to_string()),
            note,
        }
    }

    pub fn onchain_verify(tx_hash: &str) -> Self {
        Self {
            source: StatusSource::GatewayVerify,
            method: "crypto".to_string(),
            idempotency_key: Some(format!("onchain-{tx_hash}")),
            note: None,
        }
    }
}

//--------------------------------------     StatusChange     --------------------------------------------------------
/// The result of pushing a transaction through the state machine. `applied` is false when the call
/// was an idempotent no-op (the transaction was already in the requested terminal state), in which
/// case completion side effects must NOT fire again.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub transaction: Transaction,
    pub applied: bool,
}

//--------------------------------------  ReferralCommission  --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCommission {
    pub id: i64,
    pub referral_id: String,
    pub transaction_id: Option<i64>,
    pub status: String,
    pub commission_amount: Money,
    pub commission_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      AuditEvent      --------------------------------------------------------
/// Append-only record of an administrative or system action against a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEvent {
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn related_object_round_trips_as_tagged_json() {
        let obj = RelatedObject::ReferralCommission { referral_id: "ref_42".to_string() };
        let json = serde_json::to_string(&obj).unwrap();
        assert_eq!(json, r#"{"type":"referral_commission","referral_id":"ref_42"}"#);
        let back: RelatedObject = serde_json::from_str(&json).unwrap();
        assert_eq!(back.referral_id(), Some("ref_42"));
        let none: RelatedObject = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(none, RelatedObject::None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("paystack".parse::<Provider>().unwrap(), Provider::Paystack);
        assert!("venmo".parse::<Provider>().is_err());
    }
}
