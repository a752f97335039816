//! Stitchza Order Engine
//!
//! The core of the Stitchza marketplace: the order lifecycle state machine, the escrow payment
//! flow, the wallet ledger and the return workflow. The engine is transport-agnostic; the HTTP
//! surface lives in `stz_order_server`.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`mod@sqlite`]). SQLite is the shipped backend. You should never need to touch the
//!    database directly; every operation goes through the [`MarketplaceDatabase`] trait, whose
//!    methods are each one atomic transaction.
//! 2. The public API ([`mod@api`]). One struct per concern: order flow, payments, returns, wallet
//!    and platform settings. The APIs enforce the actor rules and drive every status change
//!    through the transition table in [`mod@state_machine`].
//!
//! External collaborators (payment gateway, measurement service, notifications) are ports defined
//! in [`mod@traits`], so servers and tests choose their own implementations.
mod api;

pub mod db_types;
pub mod helpers;
pub mod order_objects;
pub mod state_machine;
pub mod traits;

pub mod test_utils;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{OrderFlowApi, PaymentsApi, ReturnsApi, SettingsApi, WalletApi};
pub use traits::{MarketplaceDatabase, OrderFlowError};
