//! The engine's public operations, one API struct per concern. Each API owns a database handle
//! and whatever ports it needs; the server layer constructs them once and hands them to the
//! route handlers.
mod order_flow_api;
mod payments_api;
mod returns_api;
mod settings_api;
mod wallet_api;

pub use order_flow_api::OrderFlowApi;
pub use payments_api::PaymentsApi;
pub use returns_api::ReturnsApi;
pub use settings_api::SettingsApi;
pub use wallet_api::WalletApi;
