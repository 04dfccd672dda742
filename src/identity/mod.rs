/// Social identity verification
///
/// Turns a provider credential into [`IdentityClaims`]. Each supported
/// provider is a [`Provider`] variant backed by an [`IdentityVerifier`].

mod google;
mod line;

pub use google::GoogleVerifier;
pub use line::LineVerifier;

use crate::{
    config::ProviderConfig,
    error::{ApiError, ApiResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};

/// Supported social identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Line,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Line => "line",
        }
    }
}

impl FromStr for Provider {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "line" => Ok(Provider::Line),
            other => Err(ApiError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity asserted by a verified provider credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Provider-scoped subject identifier
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Verifies one provider's credentials
///
/// Implementations make a single attempt and report every failure as
/// `ApiError::ProviderVerificationFailed`.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> ApiResult<IdentityClaims>;
}

/// One verifier per [`Provider`] variant
#[derive(Clone)]
pub struct ProviderVerifiers {
    google: Arc<dyn IdentityVerifier>,
    line: Arc<dyn IdentityVerifier>,
}

impl ProviderVerifiers {
    pub fn new(google: Arc<dyn IdentityVerifier>, line: Arc<dyn IdentityVerifier>) -> Self {
        Self { google, line }
    }

    /// Build the network-backed verifiers
    pub fn from_config(config: &ProviderConfig) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("pbmap-auth/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let google = GoogleVerifier::new(
            http_client.clone(),
            config.google_client_id.clone(),
            config.google_jwks_url.clone(),
        );
        let line = LineVerifier::new(
            http_client,
            config.line_channel_id.clone(),
            config.line_verify_url.clone(),
        );

        Ok(Self::new(Arc::new(google), Arc::new(line)))
    }

    fn verifier(&self, provider: Provider) -> &Arc<dyn IdentityVerifier> {
        match provider {
            Provider::Google => &self.google,
            Provider::Line => &self.line,
        }
    }

    /// Verify `credential` with the verifier for `provider`
    pub async fn verify(&self, provider: Provider, credential: &str) -> ApiResult<IdentityClaims> {
        if credential.is_empty() {
            return Err(ApiError::ProviderVerificationFailed(
                "empty credential".to_string(),
            ));
        }

        let claims = self.verifier(provider).verify(credential).await?;

        if claims.subject.is_empty() {
            return Err(ApiError::ProviderVerificationFailed(format!(
                "{} credential has an empty subject",
                provider
            )));
        }

        Ok(claims)
    }
}

/// Treat empty optional claims as absent
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
