use std::time::Duration;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use haven_recon_engine::{
    db_types::{EventStatus, Provider, TransactionStatus},
    ReconciliationApi,
};
use hps_common::Secret;

use super::{
    helpers::post_request,
    mocks::{transaction, webhook_event, MockReconDb},
};
use crate::{
    config::{PayPalConfig, PaystackConfig, StripeConfig},
    gateways::{paypal::PayPalVerifier, paystack, stripe},
    routes::{paypal_webhook, paystack_webhook, stripe_webhook},
};

const STRIPE_SECRET: &str = "whsec_endpoint_test";
const PAYSTACK_SECRET: &str = "sk_endpoint_test";
const STRIPE_BODY: &[u8] =
    br#"{"id":"evt_10","type":"payment_intent.succeeded","data":{"object":{"id":"pi_10"}}}"#;

fn stripe_config() -> StripeConfig {
    StripeConfig { signing_secret: Some(Secret::new(STRIPE_SECRET.into())), tolerance: Duration::from_secs(300) }
}

fn stripe_header(body: &[u8]) -> String {
    let t = Utc::now().timestamp();
    format!("t={t},v1={}", stripe::sign_payload(STRIPE_SECRET, t, body))
}

#[actix_web::test]
async fn stripe_webhook_happy_path() {
    let _ = env_logger::try_init().ok();
    let header = stripe_header(STRIPE_BODY);
    let (status, body) = post_request(
        "/webhook/stripe",
        STRIPE_BODY.to_vec(),
        vec![("stripe-signature", &header)],
        configure_stripe_success,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

fn configure_stripe_success(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_record_event().returning(|e| {
        let mut record = webhook_event(1, Provider::Stripe, EventStatus::Pending);
        record.event_id = e.event_id;
        Ok((record, true))
    });
    db.expect_update_transaction_status().returning(|_, _, _, _, _| {
        Ok(haven_recon_engine::db_types::StatusChange {
            transaction: transaction(7, Provider::Stripe, TransactionStatus::Completed),
            applied: true,
        })
    });
    db.expect_update_event_status()
        .returning(|id, status, _, _, _, _| Ok(webhook_event(id, Provider::Stripe, status)));
    cfg.route("/webhook/stripe", web::post().to(stripe_webhook::<MockReconDb>))
        .app_data(web::Data::new(ReconciliationApi::new(db)))
        .app_data(web::Data::new(stripe_config()));
}

#[actix_web::test]
async fn stripe_webhook_bad_signature_touches_nothing() {
    let _ = env_logger::try_init().ok();
    let header = format!("t={},v1={}", Utc::now().timestamp(), "0".repeat(64));
    let (status, body) = post_request(
        "/webhook/stripe",
        STRIPE_BODY.to_vec(),
        vec![("stripe-signature", &header)],
        configure_no_ledger_calls,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Webhook signature invalid"), "was: {body}");
}

#[actix_web::test]
async fn stripe_webhook_unsupported_event_is_acked_without_recording() {
    let _ = env_logger::try_init().ok();
    let body = br#"{"id":"evt_11","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
    let header = stripe_header(body);
    let (status, response) = post_request(
        "/webhook/stripe",
        body.to_vec(),
        vec![("stripe-signature", &header)],
        configure_no_ledger_calls,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, r#"{"received":true}"#);
}

// A mock that rejects every ledger interaction: signature failures and unsupported event types
// must never reach the database.
fn configure_no_ledger_calls(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_record_event().times(0);
    db.expect_update_transaction_status().times(0);
    cfg.route("/webhook/stripe", web::post().to(stripe_webhook::<MockReconDb>))
        .route("/webhook/paystack", web::post().to(paystack_webhook::<MockReconDb>))
        .app_data(web::Data::new(ReconciliationApi::new(db)))
        .app_data(web::Data::new(stripe_config()))
        .app_data(web::Data::new(PaystackConfig { signing_secret: Some(Secret::new(PAYSTACK_SECRET.into())) }));
}

#[actix_web::test]
async fn paystack_webhook_duplicate_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let body = br#"{"event":"charge.success","data":{"reference":"hvn_1"}}"#;
    let signature = paystack::sign_payload(PAYSTACK_SECRET, body);
    let (status, response) = post_request(
        "/webhook/paystack",
        body.to_vec(),
        vec![("x-paystack-signature", &signature)],
        configure_paystack_duplicate,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, r#"{"received":true}"#);
}

fn configure_paystack_duplicate(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_record_event()
        .returning(|_| Ok((webhook_event(3, Provider::Paystack, EventStatus::Processed), false)));
    // A duplicate must short-circuit before any transition is attempted.
    db.expect_update_transaction_status().times(0);
    cfg.route("/webhook/paystack", web::post().to(paystack_webhook::<MockReconDb>))
        .app_data(web::Data::new(ReconciliationApi::new(db)))
        .app_data(web::Data::new(PaystackConfig { signing_secret: Some(Secret::new(PAYSTACK_SECRET.into())) }));
}

#[actix_web::test]
async fn paystack_webhook_wrong_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = br#"{"event":"charge.success","data":{"reference":"hvn_1"}}"#;
    let signature = paystack::sign_payload("sk_wrong_key", body);
    let (status, _) = post_request(
        "/webhook/paystack",
        body.to_vec(),
        vec![("x-paystack-signature", &signature)],
        configure_no_ledger_calls,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn paypal_webhook_fails_closed_without_a_webhook_id() {
    let _ = env_logger::try_init().ok();
    let body = br#"{"id":"WH-1","event_type":"PAYMENT.CAPTURE.COMPLETED","resource":{"id":"CAP-1"}}"#;
    let headers = vec![
        ("paypal-transmission-id", "t-1"),
        ("paypal-transmission-time", "2024-06-10T00:00:00Z"),
        ("paypal-transmission-sig", "sig"),
        ("paypal-cert-url", "https://api.paypal.com/cert"),
        ("paypal-auth-algo", "SHA256withRSA"),
    ];
    let (status, response) =
        post_request("/webhook/paypal", body.to_vec(), headers, configure_paypal_unconfigured)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response.contains("Webhook signature invalid"), "was: {response}");
}

fn configure_paypal_unconfigured(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_record_event().times(0);
    let config = PayPalConfig { webhook_id: None, ..Default::default() };
    let verifier = PayPalVerifier::new(config).expect("verifier");
    cfg.route("/webhook/paypal", web::post().to(paypal_webhook::<MockReconDb>))
        .app_data(web::Data::new(ReconciliationApi::new(db)))
        .app_data(web::Data::new(verifier));
}
