//! Behaviour that storage backends must provide to act as a backend for the Haven payment server.
//!
//! [`ReconciliationDatabase`] covers the transaction ledger and the webhook idempotency ledger.
//! [`ReferralProcessing`] and [`AuditLogging`] are the two collaborator side effects the
//! reconciliation flow coordinates with.
mod reconciliation_database;
mod side_effects;

pub use reconciliation_database::{ReconciliationDatabase, ReconciliationError};
pub use side_effects::{AuditLogging, ReferralProcessing};
