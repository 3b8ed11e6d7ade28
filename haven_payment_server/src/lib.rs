//! # Haven payment server
//! This module hosts the HTTP surface of the Haven reconciliation stack. It is responsible for:
//! Listening for incoming webhook deliveries from Stripe, Paystack and PayPal.
//! Verifying each delivery's signature before anything is parsed from its body.
//! Handing canonical payment events to the reconciliation engine, and exposing the admin recovery
//! endpoints (manual confirmation, on-chain verification, event replay, referral retry).
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/{stripe,paystack,paypal}`: The signature-verified gateway webhook endpoints.
//! * `/api/...`: The admin endpoints, gated on the `x-admin-api-key` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod gateways;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
