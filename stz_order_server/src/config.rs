use std::{env, time::Duration};

use log::*;
use paystack_client::PaystackConfig;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use stz_common::Secret;

const DEFAULT_STZ_HOST: &str = "127.0.0.1";
const DEFAULT_STZ_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/stitchza.db";
const DEFAULT_AUTO_CONFIRM_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_OPEN_TAILOR_URL: &str = "https://api.opentailor.co";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// How often the auto-confirmation sweep runs.
    pub auto_confirm_interval: Duration,
    /// Paystack gateway configuration.
    pub paystack: PaystackConfig,
    /// Open Tailor measurement service configuration.
    pub open_tailor: OpenTailorConfig,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify access tokens.
    pub jwt_secret: Secret<String>,
    /// How long an issued access token stays valid.
    pub token_validity: chrono::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { jwt_secret: Secret::new(String::default()), token_validity: chrono::Duration::hours(24) }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OpenTailorConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_STZ_HOST.to_string(),
            port: DEFAULT_STZ_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            auto_confirm_interval: DEFAULT_AUTO_CONFIRM_INTERVAL,
            paystack: PaystackConfig::default(),
            open_tailor: OpenTailorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("STZ_HOST").ok().unwrap_or_else(|| DEFAULT_STZ_HOST.into());
        let port = env::var("STZ_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for STZ_PORT. {e} Using the default, {DEFAULT_STZ_PORT}, \
                         instead."
                    );
                    DEFAULT_STZ_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_STZ_PORT);
        let database_url = env::var("STZ_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ STZ_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}, instead.");
            DEFAULT_DATABASE_URL.into()
        });
        let auto_confirm_interval = env::var("STZ_AUTO_CONFIRM_INTERVAL_SECS")
            .map(|s| {
                s.parse::<u64>().map(Duration::from_secs).unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid value for STZ_AUTO_CONFIRM_INTERVAL_SECS. {e}");
                    DEFAULT_AUTO_CONFIRM_INTERVAL
                })
            })
            .ok()
            .unwrap_or(DEFAULT_AUTO_CONFIRM_INTERVAL);
        Self {
            host,
            port,
            database_url,
            auth: AuthConfig::from_env_or_default(),
            auto_confirm_interval,
            paystack: PaystackConfig::new_from_env_or_default(),
            open_tailor: OpenTailorConfig::from_env_or_default(),
        }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        let jwt_secret = env::var("STZ_JWT_SECRET").map(Secret::new).unwrap_or_else(|_| {
            let secret: String = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect();
            warn!(
                "🪛️ STZ_JWT_SECRET is not set. A random secret has been generated for this run, so every \
                 restart will invalidate all issued tokens. Set STZ_JWT_SECRET in production."
            );
            Secret::new(secret)
        });
        let token_validity = env::var("STZ_JWT_VALIDITY_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(chrono::Duration::hours)
            .unwrap_or_else(|| chrono::Duration::hours(24));
        Self { jwt_secret, token_validity }
    }
}

impl OpenTailorConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("STZ_OPEN_TAILOR_URL").unwrap_or_else(|_| {
            warn!("🪛️ STZ_OPEN_TAILOR_URL is not set. Using the default, {DEFAULT_OPEN_TAILOR_URL}, instead.");
            DEFAULT_OPEN_TAILOR_URL.into()
        });
        let api_key = env::var("STZ_OPEN_TAILOR_API_KEY").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ STZ_OPEN_TAILOR_API_KEY is not set. Measurement lookups will likely be rejected.");
            Secret::new(String::default())
        });
        Self { base_url, api_key }
    }
}
