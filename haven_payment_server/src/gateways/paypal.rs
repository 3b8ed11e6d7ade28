//! PayPal webhook verification.
//!
//! PayPal does not use a shared-secret HMAC. Instead the webhook carries five transmission
//! headers, and the receiver calls PayPal's `verify-webhook-signature` API (authenticated with an
//! OAuth2 client-credentials token) to have PayPal confirm the delivery. Only a literal
//! `"SUCCESS"` verification status is trusted; anything else, including API timeouts and a
//! missing webhook id, fails closed.

use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{config::PayPalConfig, errors::ServerError, gateways::WebhookRejection};
use haven_recon_engine::db_types::{EventOutcome, PaymentEvent, Provider};

const TRANSMISSION_HEADERS: [&str; 5] = [
    "paypal-transmission-id",
    "paypal-transmission-time",
    "paypal-transmission-sig",
    "paypal-cert-url",
    "paypal-auth-algo",
];

/// The five headers PayPal attaches to every webhook delivery, in the order of
/// [`TRANSMISSION_HEADERS`].
#[derive(Debug, Clone)]
pub struct TransmissionHeaders {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}

impl TransmissionHeaders {
    pub fn from_request(req: &actix_web::HttpRequest) -> Option<Self> {
        let mut values = TRANSMISSION_HEADERS
            .iter()
            .map(|name| req.headers().get(*name).and_then(|v| v.to_str().ok()).map(String::from));
        Some(Self {
            transmission_id: values.next()??,
            transmission_time: values.next()??,
            transmission_sig: values.next()??,
            cert_url: values.next()??,
            auth_algo: values.next()??,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    verification_status: String,
}

#[derive(Debug, Deserialize)]
struct PayPalEvent {
    id: String,
    event_type: String,
    resource: PayPalResource,
}

#[derive(Debug, Deserialize)]
struct PayPalResource {
    id: String,
}

#[derive(Clone)]
pub struct PayPalVerifier {
    config: PayPalConfig,
    client: Client,
}

impl PayPalVerifier {
    pub fn new(config: PayPalConfig) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Asks PayPal to confirm the delivery, then decodes the payload. Returns `None` for verified
    /// events of a type we do not act on.
    pub async fn verify_and_decode(
        &self,
        headers: Option<TransmissionHeaders>,
        body: &[u8],
    ) -> Result<Option<PaymentEvent>, WebhookRejection> {
        let webhook_id = self.config.webhook_id.as_deref().ok_or_else(|| {
            warn!("🔐️ Rejecting PayPal webhook: HPS_PAYPAL_WEBHOOK_ID is not configured.");
            WebhookRejection::Verification("PayPal webhook id is not configured".into())
        })?;
        let headers =
            headers.ok_or_else(|| WebhookRejection::Verification("Missing PayPal transmission headers".into()))?;
        let webhook_event: Value =
            serde_json::from_slice(body).map_err(|e| WebhookRejection::Malformed(e.to_string()))?;
        let token = self.access_token().await?;
        let request = json!({
            "auth_algo": headers.auth_algo,
            "cert_url": headers.cert_url,
            "transmission_id": headers.transmission_id,
            "transmission_sig": headers.transmission_sig,
            "transmission_time": headers.transmission_time,
            "webhook_id": webhook_id,
            "webhook_event": webhook_event,
        });
        let url = format!("{}/v1/notifications/verify-webhook-signature", self.config.api_base);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| WebhookRejection::Verification(format!("Verification call failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(WebhookRejection::Verification(format!("Verification call returned {status}")));
        }
        let verdict: VerificationResponse =
            response.json().await.map_err(|e| WebhookRejection::Verification(e.to_string()))?;
        if verdict.verification_status != "SUCCESS" {
            warn!("🔐️ PayPal reported webhook verification status {}.", verdict.verification_status);
            return Err(WebhookRejection::Verification(format!(
                "PayPal verification status was {}",
                verdict.verification_status
            )));
        }
        trace!("🔐️ PayPal signature check ✅️");
        decode(body)
    }

    async fn access_token(&self) -> Result<String, WebhookRejection> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base);
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| WebhookRejection::Verification(format!("Token request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(WebhookRejection::Verification(format!("Token request returned {status}")));
        }
        let token: TokenResponse =
            response.json().await.map_err(|e| WebhookRejection::Verification(e.to_string()))?;
        Ok(token.access_token)
    }
}

fn decode(body: &[u8]) -> Result<Option<PaymentEvent>, WebhookRejection> {
    let event: PayPalEvent =
        serde_json::from_slice(body).map_err(|e| WebhookRejection::Malformed(e.to_string()))?;
    let outcome = match event.event_type.as_str() {
        "PAYMENT.CAPTURE.COMPLETED" => EventOutcome::Success,
        "PAYMENT.CAPTURE.DENIED" => EventOutcome::Failure,
        other => {
            debug!("🔐️ Ignoring unsupported PayPal event type {other}");
            return Ok(None);
        },
    };
    Ok(Some(PaymentEvent {
        provider: Provider::PayPal,
        event_id: event.id,
        event_type: event.event_type,
        provider_txn_id: event.resource.id,
        outcome,
    }))
}

#[cfg(test)]
mod test {
    use super::decode;
    use haven_recon_engine::db_types::{EventOutcome, Provider};

    #[test]
    fn decodes_a_capture_completed_event() {
        let body = br#"{"id":"WH-1","event_type":"PAYMENT.CAPTURE.COMPLETED","resource":{"id":"CAP-9"}}"#;
        let event = decode(body).unwrap().unwrap();
        assert_eq!(event.provider, Provider::PayPal);
        assert_eq!(event.event_id, "WH-1");
        assert_eq!(event.provider_txn_id, "CAP-9");
        assert_eq!(event.outcome, EventOutcome::Success);
    }

    #[test]
    fn unsupported_event_types_decode_to_none() {
        let body = br#"{"id":"WH-2","event_type":"BILLING.SUBSCRIPTION.CREATED","resource":{"id":"S-1"}}"#;
        assert!(decode(body).unwrap().is_none());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(decode(b"not json").is_err());
    }
}
