use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaystackApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach Paystack: {0}")]
    Transport(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Request failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Paystack declined the request: {0}")]
    Declined(String),
}
