//! Stripe webhook signatures.
//!
//! Stripe sends a `stripe-signature` header of the form `t=<unix ts>,v1=<hex hmac>[,v1=...]`. The
//! signed payload is `"{t}.{raw body}"`, keyed with the endpoint's signing secret. The timestamp
//! is bounded by a configurable tolerance to keep replayed captures out.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    config::StripeConfig,
    gateways::WebhookRejection,
    helpers::constant_time_eq,
};
use haven_recon_engine::db_types::{EventOutcome, PaymentEvent, Provider};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: StripeObject,
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

/// Verifies the `stripe-signature` header against the raw body, then decodes the payload.
/// Returns `None` for authentic events of a type we do not act on.
pub fn verify_and_decode(
    config: &StripeConfig,
    signature_header: Option<&str>,
    body: &[u8],
) -> Result<Option<PaymentEvent>, WebhookRejection> {
    let secret = config.signing_secret.as_ref().ok_or_else(|| {
        warn!("🔐️ Rejecting Stripe webhook: no signing secret is configured.");
        WebhookRejection::Verification("Stripe signing secret is not configured".into())
    })?;
    let header =
        signature_header.ok_or_else(|| WebhookRejection::Verification("Missing stripe-signature header".into()))?;
    let (timestamp, candidates) = parse_signature_header(header)?;
    check_tolerance(timestamp, config.tolerance)?;
    let expected = sign_payload(secret.reveal(), timestamp, body);
    let authentic = candidates.iter().any(|sig| constant_time_eq(sig.as_bytes(), expected.as_bytes()));
    if !authentic {
        warn!("🔐️ Invalid Stripe webhook signature.");
        return Err(WebhookRejection::Verification("No matching v1 signature".into()));
    }
    trace!("🔐️ Stripe signature check ✅️");
    decode(body)
}

/// Computes the hex v1 signature for `"{timestamp}.{body}"`. Also used by tests to forge valid
/// headers.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<String>), WebhookRejection> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for item in header.split(',') {
        match item.trim().split_once('=') {
            Some(("t", t)) => {
                timestamp = t.parse::<i64>().ok();
            },
            Some(("v1", sig)) => candidates.push(sig.to_string()),
            // Stripe also sends legacy v0 signatures; ignore them.
            _ => {},
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| WebhookRejection::Verification("No timestamp in stripe-signature header".into()))?;
    if candidates.is_empty() {
        return Err(WebhookRejection::Verification("No v1 signature in stripe-signature header".into()));
    }
    Ok((timestamp, candidates))
}

fn check_tolerance(timestamp: i64, tolerance: Duration) -> Result<(), WebhookRejection> {
    let age = (Utc::now().timestamp() - timestamp).unsigned_abs();
    if age > tolerance.as_secs() {
        warn!("🔐️ Stripe webhook timestamp is {age} s out of tolerance.");
        return Err(WebhookRejection::Verification(format!("Signature timestamp outside tolerance ({age} s)")));
    }
    Ok(())
}

fn decode(body: &[u8]) -> Result<Option<PaymentEvent>, WebhookRejection> {
    let event: StripeEvent =
        serde_json::from_slice(body).map_err(|e| WebhookRejection::Malformed(e.to_string()))?;
    let outcome = match event.event_type.as_str() {
        "payment_intent.succeeded" => EventOutcome::Success,
        "payment_intent.payment_failed" => EventOutcome::Failure,
        other => {
            debug!("🔐️ Ignoring unsupported Stripe event type {other}");
            return Ok(None);
        },
    };
    Ok(Some(PaymentEvent {
        provider: Provider::Stripe,
        event_id: event.id,
        event_type: event.event_type,
        provider_txn_id: event.data.object.id,
        outcome,
    }))
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use chrono::Utc;
    use hps_common::Secret;

    use super::{sign_payload, verify_and_decode};
    use crate::config::StripeConfig;
    use haven_recon_engine::db_types::{EventOutcome, Provider};

    const SECRET: &str = "whsec_testkey";
    const BODY: &[u8] =
        br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;

    fn config() -> StripeConfig {
        StripeConfig { signing_secret: Some(Secret::new(SECRET.into())), tolerance: Duration::from_secs(300) }
    }

    fn valid_header(body: &[u8]) -> String {
        let t = Utc::now().timestamp();
        format!("t={t},v1={}", sign_payload(SECRET, t, body))
    }

    #[test]
    fn accepts_a_valid_signature() {
        let header = valid_header(BODY);
        let event = verify_and_decode(&config(), Some(&header), BODY).unwrap().unwrap();
        assert_eq!(event.provider, Provider::Stripe);
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.provider_txn_id, "pi_123");
        assert_eq!(event.outcome, EventOutcome::Success);
    }

    #[test]
    fn rejects_a_tampered_body() {
        let header = valid_header(BODY);
        let tampered = BODY.iter().map(|b| if *b == b'3' { b'4' } else { *b }).collect::<Vec<_>>();
        assert!(verify_and_decode(&config(), Some(&header), &tampered).is_err());
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let t = Utc::now().timestamp() - 3600;
        let header = format!("t={t},v1={}", sign_payload(SECRET, t, BODY));
        assert!(verify_and_decode(&config(), Some(&header), BODY).is_err());
    }

    #[test]
    fn rejects_when_no_secret_is_configured() {
        let config = StripeConfig { signing_secret: None, tolerance: Duration::from_secs(300) };
        let header = valid_header(BODY);
        assert!(verify_and_decode(&config, Some(&header), BODY).is_err());
    }

    #[test]
    fn unsupported_event_types_decode_to_none() {
        let body = br#"{"id":"evt_2","type":"charge.refunded","data":{"object":{"id":"ch_9"}}}"#;
        let t = Utc::now().timestamp();
        let header = format!("t={t},v1={}", sign_payload(SECRET, t, body));
        assert!(verify_and_decode(&config(), Some(&header), body).unwrap().is_none());
    }
}
