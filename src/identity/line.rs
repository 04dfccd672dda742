/// LINE ID token verification through LINE's verify endpoint
use super::{non_empty, IdentityClaims, IdentityVerifier};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

/// Body returned by the verify endpoint for an accepted token
#[derive(Debug, Deserialize)]
struct LineVerifyResponse {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Verifies LINE ID tokens by asking LINE
pub struct LineVerifier {
    http_client: reqwest::Client,
    channel_id: String,
    verify_url: String,
}

impl LineVerifier {
    pub fn new(http_client: reqwest::Client, channel_id: String, verify_url: String) -> Self {
        Self {
            http_client,
            channel_id,
            verify_url,
        }
    }
}

#[async_trait]
impl IdentityVerifier for LineVerifier {
    async fn verify(&self, credential: &str) -> ApiResult<IdentityClaims> {
        if self.channel_id.is_empty() {
            return Err(ApiError::ProviderVerificationFailed(
                "LINE channel id is not configured".to_string(),
            ));
        }

        debug!("Verifying LINE token via {}", self.verify_url);

        let response = self
            .http_client
            .post(&self.verify_url)
            .form(&[
                ("id_token", credential),
                ("client_id", self.channel_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("LINE verify request failed: {}", e);
                ApiError::ProviderVerificationFailed(format!("line verify request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ApiError::ProviderVerificationFailed(format!("failed to read line response: {}", e))
        })?;

        interpret_response(status, &body)
    }
}

/// Accept only a 200 carrying a non-empty subject
fn interpret_response(status: StatusCode, body: &str) -> ApiResult<IdentityClaims> {
    if status != StatusCode::OK {
        return Err(ApiError::ProviderVerificationFailed(format!(
            "line verify returned {}",
            status
        )));
    }

    let parsed: LineVerifyResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::ProviderVerificationFailed(format!("malformed line response: {}", e))
    })?;

    if parsed.sub.is_empty() {
        return Err(ApiError::ProviderVerificationFailed(
            "line response has no subject".to_string(),
        ));
    }

    Ok(IdentityClaims {
        subject: parsed.sub,
        email: non_empty(parsed.email),
        display_name: non_empty(parsed.name),
    })
}
