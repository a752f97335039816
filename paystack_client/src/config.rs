use log::*;
use stz_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("STZ_PAYSTACK_BASE_URL").unwrap_or_else(|_| {
            info!("STZ_PAYSTACK_BASE_URL not set, using https://api.paystack.co");
            "https://api.paystack.co".to_string()
        });
        let secret_key = Secret::new(std::env::var("STZ_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("STZ_PAYSTACK_SECRET_KEY not set, using a (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        Self { base_url, secret_key }
    }
}
