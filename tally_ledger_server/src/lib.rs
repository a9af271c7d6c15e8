//! # Tally ledger server
//! The HTTP face of the ledger engine. It is responsible for:
//! * serving balance, history and package catalog queries to the marketplace collaborators,
//! * creating purchase sessions and handing users off to the payment gateway,
//! * receiving signature-verified payment webhooks from the gateway and reconciling them,
//! * accepting contract lifecycle events from the contract CRUD collaborator.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! Collaborator-facing routes live under `/api`; the gateway-facing webhook lives under `/gateway` and is
//! authenticated by HMAC signature rather than by user identity. `/health` is a plain liveness check.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod gateway;
pub mod gateway_routes;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
