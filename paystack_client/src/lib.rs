//! A minimal Paystack client covering what the Stitchza order flow needs: transaction
//! initialization, verification and webhook signature checks. Amounts are passed through in
//! minor units (kobo), which is also Paystack's wire format.
mod api;
mod config;
mod data_objects;
mod error;
mod helpers;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{
    ChargeData,
    InitializeData,
    PaystackResponse,
    WebhookEvent,
};
pub use error::PaystackApiError;
pub use helpers::{signature_for, verify_webhook_signature};
