//! The engine's seams.
//!
//! [`MarketplaceDatabase`] is the storage backend contract: every method is a single atomic
//! transaction, so a backend either applies a whole operation (order mutation + history row +
//! any ledger writes) or none of it. The remaining traits are outward-facing ports — payment
//! gateway, measurement provider and notification sink — injected into the APIs so tests can
//! substitute fakes.
mod marketplace_database;
mod measurement_provider;
mod notification_sink;
mod payment_gateway;

pub use marketplace_database::{
    MarketplaceDatabase,
    OrderFlowError,
    AUTO_CONFIRM_DAYS,
    COMMISSION_PERCENTAGE,
    DEFAULT_AUTO_CONFIRM_DAYS,
    DEFAULT_COMMISSION_PERCENTAGE,
    DEFAULT_RETURN_COURIER_FEE,
    RETURN_COURIER_FEE,
};
pub use measurement_provider::{MeasurementProvider, NoMeasurements};
pub use notification_sink::{LogSink, Notification, NotificationKind, NotificationSink};
pub use payment_gateway::{GatewayChargeStatus, GatewayInitResponse, GatewayVerification, PaymentGateway};
