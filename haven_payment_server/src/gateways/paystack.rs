//! Paystack webhook signatures.
//!
//! Paystack signs the raw request body with HMAC-SHA256 keyed on the account's secret key and
//! sends the hex digest in the `x-paystack-signature` header. Paystack events carry no standalone
//! event id, so the idempotency key is derived from the event name and the charge reference.

use hmac::{Hmac, Mac};
use log::*;
use serde::Deserialize;
use sha2::Sha256;

use crate::{config::PaystackConfig, gateways::WebhookRejection, helpers::constant_time_eq};
use haven_recon_engine::db_types::{EventOutcome, PaymentEvent, Provider};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Deserialize)]
struct PaystackEvent {
    event: String,
    data: PaystackEventData,
}

#[derive(Debug, Deserialize)]
struct PaystackEventData {
    reference: String,
}

/// Verifies the `x-paystack-signature` header against the raw body, then decodes the payload.
/// Returns `None` for authentic events of a type we do not act on.
pub fn verify_and_decode(
    config: &PaystackConfig,
    signature_header: Option<&str>,
    body: &[u8],
) -> Result<Option<PaymentEvent>, WebhookRejection> {
    let secret = config.signing_secret.as_ref().ok_or_else(|| {
        warn!("🔐️ Rejecting Paystack webhook: no signing secret is configured.");
        WebhookRejection::Verification("Paystack signing secret is not configured".into())
    })?;
    let signature =
        signature_header.ok_or_else(|| WebhookRejection::Verification("Missing x-paystack-signature header".into()))?;
    let expected = sign_payload(secret.reveal(), body);
    if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        warn!("🔐️ Invalid Paystack webhook signature.");
        return Err(WebhookRejection::Verification("Signature does not match body".into()));
    }
    trace!("🔐️ Paystack signature check ✅️");
    decode(body)
}

/// Computes the hex signature over the raw body. Also used by tests to forge valid headers.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn decode(body: &[u8]) -> Result<Option<PaymentEvent>, WebhookRejection> {
    let event: PaystackEvent =
        serde_json::from_slice(body).map_err(|e| WebhookRejection::Malformed(e.to_string()))?;
    let outcome = match event.event.as_str() {
        "charge.success" => EventOutcome::Success,
        "charge.failed" => EventOutcome::Failure,
        other => {
            debug!("🔐️ Ignoring unsupported Paystack event type {other}");
            return Ok(None);
        },
    };
    let event_id = format!("{}:{}", event.event, event.data.reference);
    Ok(Some(PaymentEvent {
        provider: Provider::Paystack,
        event_id,
        event_type: event.event,
        provider_txn_id: event.data.reference,
        outcome,
    }))
}

#[cfg(test)]
mod test {
    use hps_common::Secret;

    use super::{sign_payload, verify_and_decode};
    use crate::config::PaystackConfig;
    use haven_recon_engine::db_types::EventOutcome;

    const SECRET: &str = "sk_test_abc";
    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"hvn_ref_77"}}"#;

    fn config() -> PaystackConfig {
        PaystackConfig { signing_secret: Some(Secret::new(SECRET.into())) }
    }

    #[test]
    fn accepts_a_valid_signature_and_derives_the_event_id() {
        let sig = sign_payload(SECRET, BODY);
        let event = verify_and_decode(&config(), Some(&sig), BODY).unwrap().unwrap();
        assert_eq!(event.event_id, "charge.success:hvn_ref_77");
        assert_eq!(event.provider_txn_id, "hvn_ref_77");
        assert_eq!(event.outcome, EventOutcome::Success);
    }

    #[test]
    fn rejects_a_wrong_signature() {
        let sig = sign_payload("sk_other_key", BODY);
        assert!(verify_and_decode(&config(), Some(&sig), BODY).is_err());
    }

    #[test]
    fn rejects_a_missing_header() {
        assert!(verify_and_decode(&config(), None, BODY).is_err());
    }

    #[test]
    fn unsupported_event_types_decode_to_none() {
        let body = br#"{"event":"transfer.success","data":{"reference":"tr_1"}}"#;
        let sig = sign_payload(SECRET, body);
        assert!(verify_and_decode(&config(), Some(&sig), body).unwrap().is_none());
    }
}
