use crate::{
    db_types::{NewAuditEvent, ReferralCommission},
    traits::ReconciliationError,
};

/// The referral-commission collaborator.
///
/// The reconciliation core does not own commissions. Its only obligation is to invoke
/// [`process_commission_for_referral`](Self::process_commission_for_referral) when a qualifying
/// transaction completes, and to treat a failure here as non-fatal to the transaction's own
/// completion.
#[allow(async_fn_in_trait)]
pub trait ReferralProcessing {
    /// Computes and schedules the payout for the given referral, marking the commission as paid.
    /// Calling this twice for the same referral is harmless.
    async fn process_commission_for_referral(&self, referral_id: &str)
        -> Result<ReferralCommission, ReconciliationError>;

    async fn fetch_commission(&self, referral_id: &str) -> Result<Option<ReferralCommission>, ReconciliationError>;
}

/// The audit-trail collaborator. Append-only; a failed append must never roll back the financial
/// state change it describes.
#[allow(async_fn_in_trait)]
pub trait AuditLogging {
    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<(), ReconciliationError>;
}
