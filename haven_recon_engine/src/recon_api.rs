use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        EventStatus,
        NewAuditEvent,
        NewTransaction,
        NewWebhookEvent,
        PaymentEvent,
        Provider,
        ReferralCommission,
        StatusChange,
        StatusContext,
        Transaction,
        TransactionStatus,
        TransactionType,
        WebhookEvent,
    },
    traits::{ReconciliationDatabase, ReconciliationError},
};

/// `ReconciliationApi` is the primary API for matching inbound payment events — gateway webhooks
/// and admin actions — against the transaction ledger.
///
/// Every trigger runs the same pipeline: claim the event in the idempotency ledger, apply the
/// status transition, fire side effects at most once, and resolve the ledger entry. Handlers are
/// stateless; every decision re-reads persisted state.
pub struct ReconciliationApi<B> {
    db: B,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

/// How an inbound webhook event was disposed of. All three variants mean "the gateway should stop
/// retrying"; only storage faults bubble up as errors.
#[derive(Debug, Clone)]
pub enum EventDisposition {
    /// The event was new and the transaction reached its target status (or was already there).
    Processed { event_id: i64, transaction: Transaction },
    /// The event had already been recorded by an earlier delivery. Nothing was done.
    Duplicate { event_id: i64, status: EventStatus },
    /// The event was durably recorded but processing failed (unknown transaction, conflicting
    /// terminal state). Recoverable via the admin reprocess action.
    RecordedWithError { event_id: i64, error: String },
}

/// Identifies the admin (and their client) behind a manual action, for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AdminContext {
    pub actor_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub note: Option<String>,
}

impl<B> ReconciliationApi<B>
where B: ReconciliationDatabase
{
    /// Reconciles a verified, canonical payment event against the ledger.
    ///
    /// The caller has already authenticated the payload; from here on the flow is gateway-agnostic:
    /// 1. Claim `(provider, event_id)` in the idempotency ledger. If the claim is not fresh, stop —
    ///    a concurrent or earlier delivery owns this event.
    /// 2. Move the transaction to the event's target status.
    /// 3. On a completed deposit/investment linked to a referral, process the commission. A
    ///    failure here is logged and surfaced for admin retry, never propagated: payment
    ///    completion must not be blocked by a commission bug.
    /// 4. Resolve the ledger entry as `processed` or `failed`. Unknown transactions and
    ///    conflicting terminal states are recorded against the event and reported as accepted,
    ///    so the gateway stops redelivering an event that will never succeed.
    pub async fn process_payment_event(
        &self,
        event: &PaymentEvent,
        raw_payload: &str,
    ) -> Result<EventDisposition, ReconciliationError> {
        let new_event = NewWebhookEvent {
            provider: event.provider,
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            payload: raw_payload.to_string(),
        };
        let (record, is_new) = self.db.record_event(new_event).await?;
        if !is_new {
            info!(
                "🔄️ Duplicate delivery of {}/{} (ledger id {}, status {}). Skipping.",
                event.provider, event.event_id, record.id, record.status
            );
            return Ok(EventDisposition::Duplicate { event_id: record.id, status: record.status });
        }
        let target = event.target_status();
        let ctx = StatusContext::gateway(event.provider, &event.event_id);
        let result = self
            .db
            .update_transaction_status(event.provider, &event.provider_txn_id, None, target, &ctx)
            .await;
        match result {
            Ok(change) => {
                self.run_completion_side_effects(&change).await;
                let resolved = self
                    .db
                    .update_event_status(
                        record.id,
                        EventStatus::Processed,
                        Some(change.transaction.id),
                        Some(&event.provider_txn_id),
                        Some(target),
                        None,
                    )
                    .await?;
                debug!(
                    "🔄️ Event {}/{} processed. Transaction #{} is {}.",
                    event.provider, event.event_id, change.transaction.id, change.transaction.status
                );
                Ok(EventDisposition::Processed { event_id: resolved.id, transaction: change.transaction })
            },
            Err(
                e @ (ReconciliationError::TransactionNotFound(..) | ReconciliationError::InvalidTransition { .. }),
            ) => {
                warn!("🔄️ Event {}/{} could not be applied: {e}", event.provider, event.event_id);
                self.db
                    .update_event_status(
                        record.id,
                        EventStatus::Failed,
                        None,
                        Some(&event.provider_txn_id),
                        Some(target),
                        Some(&e.to_string()),
                    )
                    .await?;
                Ok(EventDisposition::RecordedWithError { event_id: record.id, error: e.to_string() })
            },
            Err(e) => {
                // Storage-level fault. Try to leave a trace on the ledger entry, but the original
                // error is the one that matters.
                error!("🔄️ Event {}/{} hit a backend fault: {e}", event.provider, event.event_id);
                if let Err(mark_err) = self
                    .db
                    .update_event_status(
                        record.id,
                        EventStatus::Failed,
                        None,
                        Some(&event.provider_txn_id),
                        Some(target),
                        Some(&e.to_string()),
                    )
                    .await
                {
                    error!("🔄️ Could not mark event {} as failed either: {mark_err}", record.id);
                }
                Err(e)
            },
        }
    }

    /// Manually completes a pending, non-crypto transaction.
    ///
    /// Crypto deposits are barred from this path outright: there is no gateway to attest
    /// correctness, so they require [`Self::verify_onchain_deposit`] (or a real webhook) instead.
    pub async fn confirm_transaction(
        &self,
        transaction_id: i64,
        actor: &AdminContext,
    ) -> Result<StatusChange, ReconciliationError> {
        let txn = self
            .db
            .fetch_transaction(transaction_id)
            .await?
            .ok_or(ReconciliationError::TransactionIdNotFound(transaction_id))?;
        if txn.provider == Provider::Crypto {
            warn!("🔄️ Refusing manual confirmation of crypto transaction #{transaction_id} by {}", actor.actor_id);
            return Err(ReconciliationError::ManualConfirmForbidden);
        }
        // A manual transaction might not carry a gateway reference yet; give it a deterministic one
        // so the transition function stays keyed the same way as the webhook path.
        let provider_txn_id = match txn.provider_txn_id.clone() {
            Some(id) => id,
            None => {
                let generated = format!("manual-{transaction_id}");
                self.db.set_provider_txn_id(transaction_id, &generated).await?;
                generated
            },
        };
        let key = format!("manual-confirm-{transaction_id}");
        let ctx = StatusContext::manual(&key, actor.note.clone());
        let change = self
            .db
            .update_transaction_status(txn.provider, &provider_txn_id, None, TransactionStatus::Completed, &ctx)
            .await?;
        self.run_completion_side_effects(&change).await;
        self.audit(actor, "transaction.manual_confirm", "transaction", &transaction_id.to_string(), &change).await;
        Ok(change)
    }

    /// Completes a crypto deposit after an admin has confirmed the transfer on a block explorer
    /// and supplied the transaction hash. The hash is backfilled as the provider reference before
    /// the regular transition function runs.
    pub async fn verify_onchain_deposit(
        &self,
        transaction_id: i64,
        tx_hash: &str,
        actor: &AdminContext,
    ) -> Result<StatusChange, ReconciliationError> {
        let txn = self
            .db
            .fetch_transaction(transaction_id)
            .await?
            .ok_or(ReconciliationError::TransactionIdNotFound(transaction_id))?;
        if txn.provider != Provider::Crypto {
            return Err(ReconciliationError::OnChainVerifyForbidden(txn.provider));
        }
        self.db.set_provider_txn_id(transaction_id, tx_hash).await?;
        let ctx = StatusContext::onchain_verify(tx_hash);
        let change = self
            .db
            .update_transaction_status(Provider::Crypto, tx_hash, None, TransactionStatus::Completed, &ctx)
            .await?;
        self.run_completion_side_effects(&change).await;
        self.audit(actor, "transaction.onchain_verify", "transaction", &transaction_id.to_string(), &change).await;
        Ok(change)
    }

    /// Replays a previously recorded webhook event through the same transition function, using the
    /// target status and provider reference captured at delivery time. Used to recover from a
    /// prior processing failure without waiting for gateway redelivery.
    pub async fn reprocess_event(&self, event_id: i64, actor: &AdminContext) -> Result<WebhookEvent, ReconciliationError> {
        let event = self.db.fetch_event(event_id).await?.ok_or(ReconciliationError::EventNotFound(event_id))?;
        let (target, provider_txn_id) = match (event.target_status, event.provider_txn_id.as_deref()) {
            (Some(t), Some(r)) => (t, r.to_string()),
            _ => return Err(ReconciliationError::EventNotReplayable(event_id)),
        };
        let mut ctx = StatusContext::gateway(event.provider, &event.event_id);
        ctx.note = Some(format!("reprocessed by {}", actor.actor_id));
        let change =
            self.db.update_transaction_status(event.provider, &provider_txn_id, None, target, &ctx).await?;
        self.run_completion_side_effects(&change).await;
        let resolved = self
            .db
            .update_event_status(
                event_id,
                EventStatus::Reprocessed,
                Some(change.transaction.id),
                Some(&provider_txn_id),
                Some(target),
                None,
            )
            .await?;
        self.audit(actor, "webhook_event.reprocess", "webhook_event", &event_id.to_string(), &change).await;
        info!("🔄️ Event {event_id} reprocessed. Transaction #{} is {target}.", change.transaction.id);
        Ok(resolved)
    }

    /// Manually (re)triggers the referral commission side effect. This is the recovery path when
    /// the commission failed during reconciliation.
    pub async fn retry_referral(
        &self,
        referral_id: &str,
        actor: &AdminContext,
    ) -> Result<ReferralCommission, ReconciliationError> {
        let commission = self.db.process_commission_for_referral(referral_id).await?;
        let audit_event = NewAuditEvent {
            actor_id: actor.actor_id.clone(),
            action: "referral.process_commission".to_string(),
            resource_type: "referral".to_string(),
            resource_id: referral_id.to_string(),
            details: serde_json::json!({ "commission_paid": commission.commission_paid }),
            ip: actor.ip.clone(),
            user_agent: actor.user_agent.clone(),
        };
        if let Err(e) = self.db.append_audit_event(audit_event).await {
            error!("🔄️ Could not write audit entry for referral {referral_id}: {e}");
        }
        Ok(commission)
    }

    pub async fn create_transaction(&self, txn: NewTransaction) -> Result<Transaction, ReconciliationError> {
        self.db.create_transaction(txn).await
    }

    pub async fn transaction_by_id(&self, id: i64) -> Result<Option<Transaction>, ReconciliationError> {
        self.db.fetch_transaction(id).await
    }

    /// Fires the referral commission when a deposit or investment linked to one completes.
    /// Only runs when the transition actually moved the row; replays and no-ops never re-fire.
    /// Failures are logged and left for the admin retry action.
    async fn run_completion_side_effects(&self, change: &StatusChange) {
        if !change.applied || change.transaction.status != TransactionStatus::Completed {
            return;
        }
        if !matches!(change.transaction.txn_type, TransactionType::Deposit | TransactionType::Investment) {
            return;
        }
        let Some(referral_id) = change.transaction.related_object.referral_id() else {
            return;
        };
        match self.db.process_commission_for_referral(referral_id).await {
            Ok(commission) => {
                info!(
                    "🔄️💰️ Referral commission {referral_id} processed ({}) for transaction #{}",
                    commission.commission_amount, change.transaction.id
                );
            },
            Err(e) => {
                error!(
                    "🔄️💰️ Referral commission {referral_id} failed for transaction #{}: {e}. The payment itself is \
                     complete; retry the commission from the admin referrals endpoint.",
                    change.transaction.id
                );
            },
        }
    }

    async fn audit(&self, actor: &AdminContext, action: &str, resource_type: &str, resource_id: &str, change: &StatusChange) {
        let audit_event = NewAuditEvent {
            actor_id: actor.actor_id.clone(),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details: serde_json::json!({
                "status": change.transaction.status.to_string(),
                "applied": change.applied,
                "note": actor.note,
            }),
            ip: actor.ip.clone(),
            user_agent: actor.user_agent.clone(),
        };
        // An audit failure must never roll back the financial change it describes, but it must be
        // visible in the logs.
        if let Err(e) = self.db.append_audit_event(audit_event).await {
            error!("🔄️ Could not write audit entry for {action} on {resource_type} {resource_id}: {e}");
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
