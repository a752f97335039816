use crate::traits::OrderFlowError;

/// The external body-measurement service port (Open Tailor in production).
///
/// Strictly best-effort: order creation must not block on this service. Implementations return
/// `Ok(None)` when no measurements exist; callers treat `Err` the same way and fall back to a
/// placeholder snapshot.
#[allow(async_fn_in_trait)]
pub trait MeasurementProvider: Clone {
    /// A JSON snapshot of the measurements linked to `email`, if any.
    async fn measurements_by_email(&self, email: &str) -> Result<Option<serde_json::Value>, OrderFlowError>;
}

/// A provider for deployments without a measurement service. Always returns `None`.
#[derive(Debug, Clone, Default)]
pub struct NoMeasurements;

impl MeasurementProvider for NoMeasurements {
    async fn measurements_by_email(&self, _email: &str) -> Result<Option<serde_json::Value>, OrderFlowError> {
        Ok(None)
    }
}
