//! Gateway-specific webhook verification and decoding.
//!
//! Each gateway submodule does two things, in order:
//! 1. Authenticates the raw request (HMAC signature for Stripe and Paystack, a verification API
//!    call for PayPal). Nothing is parsed from an unauthenticated body beyond what verification
//!    itself requires.
//! 2. Decodes the authenticated payload into the canonical [`PaymentEvent`] the reconciliation
//!    engine consumes. Event types we do not act on decode to `None` and are acknowledged without
//!    touching the ledger.

pub mod paypal;
pub mod paystack;
pub mod stripe;

use thiserror::Error;

use crate::errors::ServerError;

#[derive(Debug, Error)]
pub enum WebhookRejection {
    #[error("Signature verification failed. {0}")]
    Verification(String),
    #[error("Malformed webhook payload. {0}")]
    Malformed(String),
}

impl From<WebhookRejection> for ServerError {
    fn from(e: WebhookRejection) -> Self {
        match e {
            WebhookRejection::Verification(_) => ServerError::UntrustedWebhook,
            WebhookRejection::Malformed(s) => ServerError::InvalidRequestBody(s),
        }
    }
}
