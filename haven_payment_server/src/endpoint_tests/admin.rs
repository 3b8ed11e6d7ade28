use actix_web::{http::StatusCode, web, web::ServiceConfig};
use haven_recon_engine::{
    db_types::{Provider, TransactionStatus},
    ReconciliationApi,
};
use hps_common::Secret;

use super::{
    helpers::{get_request, post_request},
    mocks::{transaction, MockReconDb},
};
use crate::{
    config::ServerOptions,
    middleware::AdminKeyMiddlewareFactory,
    routes::{confirm_transaction, create_transaction, get_transaction, reprocess_event},
};

const ADMIN_KEY: &str = "hunter2";

fn admin_scope(cfg: &mut ServiceConfig, db: MockReconDb, key: Option<&str>) {
    let scope = web::scope("/api")
        .wrap(AdminKeyMiddlewareFactory::new(key.map(|k| Secret::new(k.to_string()))))
        .route("/transactions", web::post().to(create_transaction::<MockReconDb>))
        .route("/transactions/{id}", web::get().to(get_transaction::<MockReconDb>))
        .route("/transactions/{id}/confirm", web::post().to(confirm_transaction::<MockReconDb>))
        .route("/webhook-events", web::post().to(reprocess_event::<MockReconDb>));
    cfg.service(scope)
        .app_data(web::Data::new(ReconciliationApi::new(db)))
        .app_data(web::Data::new(ServerOptions { use_x_forwarded_for: false, use_forwarded: false }));
}

#[actix_web::test]
async fn admin_calls_without_a_key_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request("/api/transactions/1", vec![], configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_calls_with_a_wrong_key_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request("/api/transactions/1", vec![("x-admin-api-key", "hunter3")], configure_untouched)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn an_unset_admin_key_rejects_everything() {
    let _ = env_logger::try_init().ok();
    let (status, _) =
        get_request("/api/transactions/1", vec![("x-admin-api-key", ADMIN_KEY)], configure_no_key_configured)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_fetch_transaction().times(0);
    admin_scope(cfg, db, Some(ADMIN_KEY));
}

fn configure_no_key_configured(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_fetch_transaction().times(0);
    admin_scope(cfg, db, None);
}

#[actix_web::test]
async fn fetching_a_known_transaction_succeeds() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/api/transactions/7", vec![("x-admin-api-key", ADMIN_KEY)], configure_fetch).await.expect("ok");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""id":7"#), "was: {body}");
    assert!(body.contains(r#""status":"completed""#), "was: {body}");
}

#[actix_web::test]
async fn fetching_a_missing_transaction_is_a_404() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/api/transactions/8", vec![("x-admin-api-key", ADMIN_KEY)], configure_fetch).await.expect("ok");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("error"), "was: {body}");
}

fn configure_fetch(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_fetch_transaction()
        .returning(|id| Ok((id == 7).then(|| transaction(7, Provider::Stripe, TransactionStatus::Completed))));
    admin_scope(cfg, db, Some(ADMIN_KEY));
}

#[actix_web::test]
async fn crypto_transactions_cannot_be_confirmed_manually() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request(
        "/api/transactions/9/confirm",
        Vec::new(),
        vec![("x-admin-api-key", ADMIN_KEY)],
        configure_crypto_confirm,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("cannot be confirmed manually"), "was: {body}");
}

fn configure_crypto_confirm(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_fetch_transaction()
        .returning(|_| Ok(Some(transaction(9, Provider::Crypto, TransactionStatus::Pending))));
    db.expect_update_transaction_status().times(0);
    admin_scope(cfg, db, Some(ADMIN_KEY));
}

#[actix_web::test]
async fn reprocess_with_an_unknown_action_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = br#"{"id":1,"action":"delete"}"#.to_vec();
    let (status, response) = post_request(
        "/api/webhook-events",
        body,
        vec![("x-admin-api-key", ADMIN_KEY), ("content-type", "application/json")],
        configure_untouched_events,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response.contains("Unsupported action"), "was: {response}");
}

fn configure_untouched_events(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_fetch_event().times(0);
    admin_scope(cfg, db, Some(ADMIN_KEY));
}

#[actix_web::test]
async fn creating_a_transaction_returns_201() {
    let _ = env_logger::try_init().ok();
    let body = br#"{"user_id":"user_1","txn_type":"deposit","amount":5000,"currency":"USD","provider":"stripe","provider_txn_id":"pi_55"}"#.to_vec();
    let (status, response) = post_request(
        "/api/transactions",
        body,
        vec![("x-admin-api-key", ADMIN_KEY), ("content-type", "application/json")],
        configure_create,
    )
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    assert!(response.contains(r#""status":"pending""#), "was: {response}");
}

fn configure_create(cfg: &mut ServiceConfig) {
    let mut db = MockReconDb::new();
    db.expect_create_transaction().returning(|txn| {
        let mut created = transaction(12, txn.provider, TransactionStatus::Pending);
        created.provider_txn_id = txn.provider_txn_id;
        Ok(created)
    });
    admin_scope(cfg, db, Some(ADMIN_KEY));
}
