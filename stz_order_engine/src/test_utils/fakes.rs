//! In-memory implementations of the engine's outward ports.
use std::sync::{Arc, Mutex};

use chrono::Utc;
use stz_common::Money;

use crate::traits::{
    GatewayChargeStatus,
    GatewayInitResponse,
    GatewayVerification,
    MeasurementProvider,
    Notification,
    NotificationSink,
    OrderFlowError,
    PaymentGateway,
};

/// A gateway whose verification outcome is set by the test. `initialize_transaction` always
/// succeeds and hands back a checkout URL derived from the reference.
#[derive(Clone, Default)]
pub struct FakeGateway {
    verification: Arc<Mutex<Option<GatewayVerification>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_charge(&self, status: GatewayChargeStatus, amount: Money) {
        let paid_at = (status == GatewayChargeStatus::Success).then(Utc::now);
        *self.verification.lock().unwrap() = Some(GatewayVerification { status, amount, paid_at });
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

impl PaymentGateway for FakeGateway {
    async fn initialize_transaction(
        &self,
        _email: &str,
        _amount: Money,
        reference: &str,
        _metadata: serde_json::Value,
    ) -> Result<GatewayInitResponse, OrderFlowError> {
        if *self.unavailable.lock().unwrap() {
            return Err(OrderFlowError::ExternalUnavailable("Paystack".to_string()));
        }
        Ok(GatewayInitResponse {
            authorization_url: format!("https://checkout.test/{reference}"),
            access_code: format!("AC_{reference}"),
            reference: reference.to_string(),
        })
    }

    async fn verify_transaction(&self, _reference: &str) -> Result<GatewayVerification, OrderFlowError> {
        if *self.unavailable.lock().unwrap() {
            return Err(OrderFlowError::ExternalUnavailable("Paystack".to_string()));
        }
        self.verification
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| OrderFlowError::not_found("Transaction".to_string()))
    }
}

/// A measurement provider with a canned response per test.
#[derive(Clone, Default)]
pub struct FakeMeasurements {
    response: Arc<Mutex<Option<serde_json::Value>>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeMeasurements {
    pub fn with_snapshot(snapshot: serde_json::Value) -> Self {
        Self { response: Arc::new(Mutex::new(Some(snapshot))), failing: Arc::new(Mutex::new(false)) }
    }

    pub fn failing() -> Self {
        Self { response: Arc::new(Mutex::new(None)), failing: Arc::new(Mutex::new(true)) }
    }
}

impl MeasurementProvider for FakeMeasurements {
    async fn measurements_by_email(&self, _email: &str) -> Result<Option<serde_json::Value>, OrderFlowError> {
        if *self.failing.lock().unwrap() {
            return Err(OrderFlowError::ExternalUnavailable("Open Tailor".to_string()));
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

/// A sink that records every notification for later assertion.
#[derive(Clone, Default)]
pub struct RecordingSink {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
