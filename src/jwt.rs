/// Application token issuing and validation
use crate::{
    db::models::Role,
    error::{ApiError, ApiResult},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signing parameters, fixed for the life of the issuer
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl: Duration,
}

/// Claims carried by an app token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppClaims {
    pub user_id: String,
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per issue, so two tokens minted in the same second differ
    #[serde(default)]
    pub jti: String,
}

/// Identity recovered from a valid app token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDetails {
    pub user_id: Uuid,
    pub role: Role,
}

/// HS256 signer and verifier for app tokens
pub struct JwtIssuer {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtIssuer {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Lifetime of tokens issued here
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> ApiResult<String> {
        let now = Utc::now();
        let claims = AppClaims {
            user_id: user_id.to_string(),
            role: role.as_str().to_string(),
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.config.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::TokenIssuanceFailed(e.to_string()))
    }

    /// Check signature, algorithm, issuer and expiry, then read the identity claims
    pub fn validate(&self, token: &str) -> ApiResult<TokenDetails> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.leeway = 0;

        let data = decode::<AppClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| ApiError::Authentication(format!("Invalid token: {}", e)))?;

        let user_id = Uuid::parse_str(&data.claims.user_id)
            .map_err(|_| ApiError::Authentication("Invalid user_id claim".to_string()))?;
        let role = data
            .claims
            .role
            .parse::<Role>()
            .map_err(|_| ApiError::Authentication("Invalid role claim".to_string()))?;

        Ok(TokenDetails { user_id, role })
    }
}
