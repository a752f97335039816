use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stz_common::Money;

use crate::traits::OrderFlowError;

/// The state of a charge as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayChargeStatus {
    Success,
    Failed,
    Pending,
    Abandoned,
}

impl GatewayChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayChargeStatus::Success => "success",
            GatewayChargeStatus::Failed => "failed",
            GatewayChargeStatus::Pending => "pending",
            GatewayChargeStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInitResponse {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayVerification {
    pub status: GatewayChargeStatus,
    pub amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
}

/// The payment gateway port. Amounts are in minor units end to end.
///
/// Payment is a critical path: implementations surface transport failures as
/// [`OrderFlowError::ExternalUnavailable`] so callers can retry, rather than degrading.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    async fn initialize_transaction(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        metadata: serde_json::Value,
    ) -> Result<GatewayInitResponse, OrderFlowError>;

    async fn verify_transaction(&self, reference: &str) -> Result<GatewayVerification, OrderFlowError>;
}
