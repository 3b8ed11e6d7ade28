//! Haven Reconciliation Engine
//!
//! The reconciliation engine is the correctness-critical core of the Haven investment platform's
//! payment stack. It matches inbound payment-gateway events and admin actions against a durable
//! ledger of financial transactions, guaranteeing that money is neither double-credited nor lost
//! when gateways redeliver webhooks or admins replay failed events.
//!
//! The library is divided into three main sections:
//! 1. Database types and backend traits ([`db_types`], [`traits`]). The traits describe the two
//!    durable ledgers (transactions and webhook events) plus the referral and audit collaborators.
//!    You should never need to access the database directly; use the public API instead.
//! 2. The SQLite backend ([`SqliteDatabase`]), which implements the traits with an atomic
//!    insert-if-absent idempotency claim and a guarded status update.
//! 3. The reconciliation API ([`ReconciliationApi`]), the single orchestration layer every inbound
//!    trigger — webhook, manual confirmation, on-chain verification, admin replay — flows through.
pub mod db_types;
pub mod sqlite;
pub mod traits;

mod recon_api;

pub use recon_api::{AdminContext, EventDisposition, ReconciliationApi};
pub use sqlite::SqliteDatabase;
