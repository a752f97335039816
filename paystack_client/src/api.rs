use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use stz_common::Money;

use crate::{
    config::PaystackConfig,
    data_objects::{ChargeData, InitializeData, PaystackResponse},
    PaystackApiError,
};

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val =
            HeaderValue::from_str(&bearer).map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn webhook_secret(&self) -> &str {
        self.config.secret_key.reveal()
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PaystackApiError> {
        let url = format!("{}{path}", self.config.base_url);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PaystackApiError::Transport(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            let envelope =
                response.json::<PaystackResponse<T>>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
            if !envelope.status {
                return Err(PaystackApiError::Declined(envelope.message));
            }
            envelope.data.ok_or_else(|| PaystackApiError::JsonError("Response carried no data".to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::Transport(e.to_string()))?;
            Err(PaystackApiError::QueryError { status, message })
        }
    }

    /// `POST /transaction/initialize`. `amount` is in kobo, which is Paystack's wire format.
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        metadata: Value,
    ) -> Result<InitializeData, PaystackApiError> {
        let body = json!({
            "email": email,
            "amount": amount.value(),
            "reference": reference,
            "metadata": metadata,
        });
        debug!("Initializing transaction {reference}");
        let data = self.rest_query::<InitializeData, Value>(Method::POST, "/transaction/initialize", Some(body)).await?;
        info!("Initialized transaction {reference}");
        Ok(data)
    }

    /// `GET /transaction/verify/{reference}`.
    pub async fn verify_transaction(&self, reference: &str) -> Result<ChargeData, PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction {reference}");
        let data = self.rest_query::<ChargeData, ()>(Method::GET, &path, None).await?;
        info!("Verified transaction {reference}: {}", data.status);
        Ok(data)
    }
}
