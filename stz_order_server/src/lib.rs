//! # Stitchza order server
//!
//! The HTTP face of the order engine. It is responsible for:
//! * Authenticating callers and turning their JWTs into engine actors.
//! * Exposing the order, return, payment, wallet and settings APIs over REST.
//! * Receiving Paystack webhook deliveries and gating them on the `x-paystack-signature` HMAC.
//! * Running the auto-confirmation sweep on a timer.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.

pub mod auth;
pub mod auto_confirm_worker;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;

