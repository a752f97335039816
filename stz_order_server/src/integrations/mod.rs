//! Adapters connecting the engine's ports to real external services.

pub mod open_tailor;
pub mod paystack;

pub use open_tailor::OpenTailor;
pub use paystack::PaystackGateway;
