//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Webhook handlers never deserialize the body before the gateway's signature has been checked,
//! and they answer 200 for every event that was durably recorded, even when reconciliation
//! failed, so gateways do not hammer us with redeliveries that can never succeed. Admin handlers
//! sit behind the admin-key middleware and translate engine errors through [`ServerError`].

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use serde_json::json;

use haven_recon_engine::{
    db_types::PaymentEvent,
    traits::ReconciliationDatabase,
    AdminContext,
    EventDisposition,
    ReconciliationApi,
};

use crate::{
    config::{PaystackConfig, ServerOptions, StripeConfig},
    data_objects::{
        NewTransactionRequest,
        OnChainDepositRequest,
        ReprocessRequest,
        RetryReferralRequest,
        WebhookAck,
    },
    errors::ServerError,
    gateways::{
        paypal::{PayPalVerifier, TransmissionHeaders},
        paystack,
        stripe,
    },
    helpers::get_remote_ip,
};

/// The header admin clients may set to identify the human behind a manual action in the audit
/// trail. Requests without it are attributed to "admin".
pub const ADMIN_ACTOR_HEADER: &str = "x-admin-actor";

//----------------------------------------------   Health  ----------------------------------------------------

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Webhooks ----------------------------------------------------

pub async fn stripe_webhook<B: ReconciliationDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
    config: web::Data<StripeConfig>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received Stripe webhook request: {}", req.uri());
    let signature = req.headers().get(stripe::SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = stripe::verify_and_decode(&config, signature, &body)?;
    reconcile_event(event, &body, &api).await
}

pub async fn paystack_webhook<B: ReconciliationDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
    config: web::Data<PaystackConfig>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received Paystack webhook request: {}", req.uri());
    let signature = req.headers().get(paystack::SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = paystack::verify_and_decode(&config, signature, &body)?;
    reconcile_event(event, &body, &api).await
}

pub async fn paypal_webhook<B: ReconciliationDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
    verifier: web::Data<PayPalVerifier>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received PayPal webhook request: {}", req.uri());
    let headers = TransmissionHeaders::from_request(&req);
    let event = verifier.verify_and_decode(headers, &body).await?;
    reconcile_event(event, &body, &api).await
}

/// Runs a verified event through the reconciliation engine. Every disposition acknowledges the
/// delivery; only storage faults surface as errors (and a 500, prompting gateway redelivery).
async fn reconcile_event<B: ReconciliationDatabase>(
    event: Option<PaymentEvent>,
    raw_body: &[u8],
    api: &ReconciliationApi<B>,
) -> Result<HttpResponse, ServerError> {
    let Some(event) = event else {
        return Ok(HttpResponse::Ok().json(WebhookAck::received()));
    };
    let raw_payload = String::from_utf8_lossy(raw_body);
    let disposition = api.process_payment_event(&event, &raw_payload).await?;
    match disposition {
        EventDisposition::Processed { event_id, transaction } => {
            info!(
                "💻️ Webhook {}/{} reconciled as ledger entry {event_id}. Transaction #{} is {}.",
                event.provider, event.event_id, transaction.id, transaction.status
            );
        },
        EventDisposition::Duplicate { event_id, .. } => {
            info!("💻️ Webhook {}/{} was a duplicate of ledger entry {event_id}.", event.provider, event.event_id);
        },
        EventDisposition::RecordedWithError { event_id, error } => {
            warn!(
                "💻️ Webhook {}/{} recorded as ledger entry {event_id} but not applied: {error}",
                event.provider, event.event_id
            );
        },
    }
    Ok(HttpResponse::Ok().json(WebhookAck::received()))
}

//----------------------------------------------    Admin  ----------------------------------------------------

pub async fn create_transaction<B: ReconciliationDatabase>(
    body: web::Json<NewTransactionRequest>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST create {} transaction via {}", request.txn_type, request.provider);
    let txn = api.create_transaction(request.into()).await?;
    Ok(HttpResponse::Created().json(txn))
}

pub async fn get_transaction<B: ReconciliationDatabase>(
    path: web::Path<i64>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let txn = api
        .transaction_by_id(id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Transaction {id} does not exist")))?;
    Ok(HttpResponse::Ok().json(txn))
}

pub async fn confirm_transaction<B: ReconciliationDatabase>(
    req: HttpRequest,
    path: web::Path<i64>,
    api: web::Data<ReconciliationApi<B>>,
    opts: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let actor = admin_context(&req, &opts);
    info!("💻️ POST manual confirmation of transaction #{id} by {}", actor.actor_id);
    let change = api.confirm_transaction(id, &actor).await?;
    Ok(HttpResponse::Ok().json(json!({
        "transaction": change.transaction,
        "applied": change.applied,
    })))
}

pub async fn onchain_deposit<B: ReconciliationDatabase>(
    req: HttpRequest,
    body: web::Json<OnChainDepositRequest>,
    api: web::Data<ReconciliationApi<B>>,
    opts: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let actor = admin_context(&req, &opts);
    info!(
        "💻️ PATCH on-chain verification of transaction #{} ({}) by {}",
        request.transaction_id, request.tx_hash, actor.actor_id
    );
    let change = api.verify_onchain_deposit(request.transaction_id, &request.tx_hash, &actor).await?;
    Ok(HttpResponse::Ok().json(json!({
        "transaction": change.transaction,
        "applied": change.applied,
    })))
}

pub async fn reprocess_event<B: ReconciliationDatabase>(
    req: HttpRequest,
    body: web::Json<ReprocessRequest>,
    api: web::Data<ReconciliationApi<B>>,
    opts: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    if request.action != "reprocess" {
        return Err(ServerError::InvalidRequestBody(format!("Unsupported action: {}", request.action)));
    }
    let actor = admin_context(&req, &opts);
    info!("💻️ POST reprocess of webhook event {} by {}", request.id, actor.actor_id);
    let event = api.reprocess_event(request.id, &actor).await?;
    Ok(HttpResponse::Ok().json(event))
}

pub async fn retry_referral<B: ReconciliationDatabase>(
    req: HttpRequest,
    body: web::Json<RetryReferralRequest>,
    api: web::Data<ReconciliationApi<B>>,
    opts: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    if request.action != "process" {
        return Err(ServerError::InvalidRequestBody(format!("Unsupported action: {}", request.action)));
    }
    let actor = admin_context(&req, &opts);
    info!("💻️ PATCH referral commission retry for {} by {}", request.referral_id, actor.actor_id);
    let commission = api.retry_referral(&request.referral_id, &actor).await?;
    Ok(HttpResponse::Ok().json(commission))
}

fn admin_context(req: &HttpRequest, opts: &ServerOptions) -> AdminContext {
    let actor_id = req
        .headers()
        .get(ADMIN_ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("admin")
        .to_string();
    let ip = get_remote_ip(req, opts.use_x_forwarded_for, opts.use_forwarded).map(|ip| ip.to_string());
    let user_agent = req.headers().get("User-Agent").and_then(|v| v.to_str().ok()).map(String::from);
    AdminContext { actor_id, ip, user_agent, note: None }
}
