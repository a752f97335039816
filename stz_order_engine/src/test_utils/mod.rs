//! Helpers for the engine's own tests and for downstream crates testing against the engine:
//! database preparation, record fixtures and in-memory port fakes.
pub mod fakes;
pub mod fixtures;
#[cfg(feature = "sqlite")]
pub mod prepare_env;
