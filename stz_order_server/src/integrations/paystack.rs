use log::warn;
use paystack_client::{ChargeData, PaystackApi, PaystackConfig};
use serde_json::Value;
use stz_common::Money;
use stz_order_engine::traits::{
    GatewayChargeStatus, GatewayInitResponse, GatewayVerification, OrderFlowError, PaymentGateway,
};

use crate::errors::ServerError;

/// The production [`PaymentGateway`]: a thin shim over the Paystack REST client.
///
/// Every client error is surfaced as [`OrderFlowError::ExternalUnavailable`]. The engine treats
/// the gateway as a critical dependency and propagates that as a 502, so callers know to retry
/// rather than being told their order is broken.
#[derive(Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self, ServerError> {
        let api = PaystackApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }

    pub fn webhook_secret(&self) -> &str {
        self.api.webhook_secret()
    }

    fn verification_from(charge: ChargeData) -> GatewayVerification {
        let status = match charge.status.as_str() {
            "success" => GatewayChargeStatus::Success,
            "failed" => GatewayChargeStatus::Failed,
            "abandoned" => GatewayChargeStatus::Abandoned,
            "pending" | "ongoing" | "processing" | "queued" => GatewayChargeStatus::Pending,
            other => {
                warn!("💸️ Unrecognised charge status '{other}' for {}. Treating it as pending.", charge.reference);
                GatewayChargeStatus::Pending
            },
        };
        GatewayVerification { status, amount: Money::from(charge.amount), paid_at: charge.paid_at }
    }
}

impl PaymentGateway for PaystackGateway {
    async fn initialize_transaction(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        metadata: Value,
    ) -> Result<GatewayInitResponse, OrderFlowError> {
        let data = self
            .api
            .initialize_transaction(email, amount, reference, metadata)
            .await
            .map_err(|e| OrderFlowError::ExternalUnavailable(format!("Paystack: {e}")))?;
        Ok(GatewayInitResponse {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify_transaction(&self, reference: &str) -> Result<GatewayVerification, OrderFlowError> {
        let charge = self
            .api
            .verify_transaction(reference)
            .await
            .map_err(|e| OrderFlowError::ExternalUnavailable(format!("Paystack: {e}")))?;
        Ok(Self::verification_from(charge))
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    #[test]
    fn charge_status_mapping() {
        let charge = |status: &str| ChargeData {
            status: status.to_string(),
            reference: "STZ-1".to_string(),
            amount: 29_500_00,
            currency: "NGN".to_string(),
            paid_at: Some(Utc::now()),
        };
        let v = PaystackGateway::verification_from(charge("success"));
        assert_eq!(v.status, GatewayChargeStatus::Success);
        assert_eq!(v.amount, Money::from(29_500_00));
        assert_eq!(PaystackGateway::verification_from(charge("failed")).status, GatewayChargeStatus::Failed);
        assert_eq!(PaystackGateway::verification_from(charge("abandoned")).status, GatewayChargeStatus::Abandoned);
        // Unknown statuses must not trigger a capture or a failure.
        assert_eq!(PaystackGateway::verification_from(charge("reversed")).status, GatewayChargeStatus::Pending);
    }
}
