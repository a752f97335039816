//! JWT issuance and validation.
//!
//! Access tokens are HS256 JWTs signed with the server's `STZ_JWT_SECRET`. The claims carry the
//! user id and role, which together form the engine [`Actor`] that every API call runs as.
//! Handlers obtain the claims by taking [`JwtClaims`] as an extractor argument; requests without
//! a valid `Authorization: Bearer` header are rejected before the handler runs.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use stz_order_engine::db_types::{Actor, Role};

use crate::{config::AuthConfig, errors::{AuthError, ServerError}};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id.
    pub sub: i64,
    pub role: Role,
    /// Expiry, as a unix timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor { id: self.sub, role: self.role }
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validity: config.token_validity,
        }
    }

    /// Issue a new access token for the given actor. The token is valid for the configured
    /// validity period and will NOT refresh.
    pub fn issue_token(&self, actor: &Actor) -> Result<String, AuthError> {
        let claims =
            JwtClaims { sub: actor.id, role: actor.role, exp: (Utc::now() + self.validity).timestamp() };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(format!("Could not sign access token. {e}")))
    }

    pub fn decode_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        Ok(data.claims)
    }
}

fn claims_from_request(req: &HttpRequest) -> Result<JwtClaims, ServerError> {
    let header = req.headers().get("Authorization").ok_or(AuthError::MissingToken)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a Bearer token".to_string()))?;
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ServerError::ConfigurationError("No token issuer is registered".to_string()))?;
    let claims = issuer.decode_token(token)?;
    debug!("🔐️ Validated access token for user {} ({})", claims.sub, claims.role);
    Ok(claims)
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req))
    }
}
