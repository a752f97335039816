use std::sync::Arc;

use log::{debug, trace};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    StatusCode,
};
use serde_json::Value;
use stz_order_engine::traits::{MeasurementProvider, OrderFlowError};

use crate::{config::OpenTailorConfig, errors::ServerError};

/// The production [`MeasurementProvider`]: fetches body measurements from Open Tailor by email.
///
/// The engine calls this on a best-effort basis during order creation, so any failure here only
/// costs the order its measurement snapshot, never the order itself.
#[derive(Clone)]
pub struct OpenTailor {
    base_url: String,
    client: Arc<Client>,
}

impl OpenTailor {
    pub fn new(config: OpenTailorConfig) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { base_url: config.base_url, client: Arc::new(client) })
    }
}

impl MeasurementProvider for OpenTailor {
    async fn measurements_by_email(&self, email: &str) -> Result<Option<Value>, OrderFlowError> {
        let url = format!("{}/api/v1/measurements", self.base_url);
        trace!("📏️ Fetching measurements for {email}");
        let response = self
            .client
            .get(url)
            .query(&[("email", email)])
            .send()
            .await
            .map_err(|e| OrderFlowError::ExternalUnavailable(format!("Open Tailor: {e}")))?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("📏️ No measurements on file for {email}");
                Ok(None)
            },
            s if s.is_success() => {
                let snapshot = response
                    .json::<Value>()
                    .await
                    .map_err(|e| OrderFlowError::ExternalUnavailable(format!("Open Tailor: {e}")))?;
                Ok(Some(snapshot))
            },
            s => Err(OrderFlowError::ExternalUnavailable(format!("Open Tailor returned {s}"))),
        }
    }
}
