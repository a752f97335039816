use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Paystack's uniform response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackResponse<T> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

/// `data` of a successful `POST /transaction/initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeData {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// `data` of `GET /transaction/verify/{reference}`. Only the fields the order flow consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeData {
    pub status: String,
    pub reference: String,
    /// Kobo.
    pub amount: i64,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A webhook delivery. The `event` discriminator is kept as a string: Paystack adds event types
/// over time and unknown ones must pass through to be logged, not fail deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    /// The transaction reference carried by charge events, if any.
    pub fn reference(&self) -> Option<&str> {
        self.data.get("reference").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::WebhookEvent;

    #[test]
    fn webhook_event_reference() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event":"charge.success","data":{"reference":"STZ-20260829-AB12-1756","amount":2950000}}"#,
        )
        .unwrap();
        assert_eq!(event.event, "charge.success");
        assert_eq!(event.reference(), Some("STZ-20260829-AB12-1756"));

        let bare: WebhookEvent = serde_json::from_str(r#"{"event":"transfer.success"}"#).unwrap();
        assert_eq!(bare.reference(), None);
    }
}
