use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;

use haven_recon_engine::{ReconciliationApi, SqliteDatabase};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    gateways::paypal::PayPalVerifier,
    middleware::AdminKeyMiddlewareFactory,
    routes::{
        confirm_transaction,
        create_transaction,
        get_transaction,
        health,
        onchain_deposit,
        paypal_webhook,
        paystack_webhook,
        reprocess_event,
        retry_referral,
        stripe_webhook,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database migrations are up to date.");
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let verifier = PayPalVerifier::new(config.paypal.clone())?;
    let srv = HttpServer::new(move || {
        let api = ReconciliationApi::new(db.clone());
        let options = ServerOptions::from_config(&config);
        let paypal_verifier = verifier.clone();
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("hps::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(config.stripe.clone()))
            .app_data(web::Data::new(config.paystack.clone()))
            .app_data(web::Data::new(paypal_verifier));
        // Signature-verified gateway endpoints. No other authentication applies here.
        let webhook_scope = web::scope("/webhook")
            .route("/stripe", web::post().to(stripe_webhook::<SqliteDatabase>))
            .route("/paystack", web::post().to(paystack_webhook::<SqliteDatabase>))
            .route("/paypal", web::post().to(paypal_webhook::<SqliteDatabase>));
        // Admin endpoints, gated on the static admin key.
        let admin_scope = web::scope("/api")
            .wrap(AdminKeyMiddlewareFactory::new(config.admin_api_key.clone()))
            .route("/transactions", web::post().to(create_transaction::<SqliteDatabase>))
            .route("/transactions/{id}", web::get().to(get_transaction::<SqliteDatabase>))
            .route("/transactions/{id}/confirm", web::post().to(confirm_transaction::<SqliteDatabase>))
            .route("/onchain-deposits", web::patch().to(onchain_deposit::<SqliteDatabase>))
            .route("/webhook-events", web::post().to(reprocess_event::<SqliteDatabase>))
            .route("/referrals", web::patch().to(retry_referral::<SqliteDatabase>));
        app.service(health).service(webhook_scope).service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
