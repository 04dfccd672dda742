/// Google ID token verification against Google's published signing keys
use super::{non_empty, IdentityClaims, IdentityVerifier};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Issuers Google puts in ID tokens
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// How long fetched signing keys are trusted before refetching
const JWKS_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between refetches triggered by an unknown key id
const JWKS_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

/// Verifies Google ID tokens (RS256, issuer, expiry, audience)
pub struct GoogleVerifier {
    http_client: reqwest::Client,
    client_id: String,
    jwks_url: String,
    keys: RwLock<Option<CachedKeys>>,
    /// Keys supplied up front are never refetched
    pinned: bool,
}

impl GoogleVerifier {
    pub fn new(http_client: reqwest::Client, client_id: String, jwks_url: String) -> Self {
        Self {
            http_client,
            client_id,
            jwks_url,
            keys: RwLock::new(None),
            pinned: false,
        }
    }

    /// Verifier with a fixed key set and no network access
    pub fn with_keys(client_id: String, set: JwkSet) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            client_id,
            jwks_url: String::new(),
            keys: RwLock::new(Some(CachedKeys {
                set,
                fetched_at: Instant::now(),
            })),
            pinned: true,
        }
    }

    async fn fetch_keys(&self) -> ApiResult<JwkSet> {
        debug!("Fetching Google signing keys from {}", self.jwks_url);

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| failure(format!("failed to fetch Google signing keys: {}", e)))?;

        if !response.status().is_success() {
            return Err(failure(format!(
                "Google key endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| failure(format!("invalid Google key set: {}", e)))
    }

    /// Current key set, refetched when stale or when `force` is set
    ///
    /// A forced refetch is skipped while the cached set is younger than
    /// [`JWKS_REFETCH_INTERVAL`], so unknown key ids cannot drive traffic
    /// to Google.
    async fn key_set(&self, force: bool) -> ApiResult<JwkSet> {
        {
            let cached = self.keys.read().await;
            if let Some(keys) = cached.as_ref() {
                let age = keys.fetched_at.elapsed();
                let fresh = if force {
                    age < JWKS_REFETCH_INTERVAL
                } else {
                    age < JWKS_TTL
                };
                if self.pinned || fresh {
                    return Ok(keys.set.clone());
                }
            }
        }

        let set = self.fetch_keys().await?;
        *self.keys.write().await = Some(CachedKeys {
            set: set.clone(),
            fetched_at: Instant::now(),
        });
        Ok(set)
    }

    fn validate_with(&self, token: &str, key: &DecodingKey) -> ApiResult<IdentityClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let data = decode::<GoogleClaims>(token, key, &validation)
            .map_err(|e| failure(format!("invalid google token: {}", e)))?;

        Ok(IdentityClaims {
            subject: data.claims.sub,
            email: non_empty(data.claims.email),
            display_name: non_empty(data.claims.name),
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, credential: &str) -> ApiResult<IdentityClaims> {
        if self.client_id.is_empty() {
            return Err(failure("Google client id is not configured".to_string()));
        }

        let header = decode_header(credential)
            .map_err(|e| failure(format!("malformed google token: {}", e)))?;

        if header.alg != Algorithm::RS256 {
            warn!("Rejected Google token signed with {:?}", header.alg);
            return Err(failure(format!("unexpected signing algorithm {:?}", header.alg)));
        }

        let kid = header
            .kid
            .ok_or_else(|| failure("google token has no key id".to_string()))?;

        let mut set = self.key_set(false).await?;
        if set.find(&kid).is_none() && !self.pinned {
            // Google rotates keys; one refetch before giving up
            set = self.key_set(true).await?;
        }

        let jwk = set
            .find(&kid)
            .ok_or_else(|| failure(format!("unknown signing key {}", kid)))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| failure(format!("unusable signing key {}: {}", kid, e)))?;

        self.validate_with(credential, &key)
    }
}

fn failure(message: String) -> ApiError {
    ApiError::ProviderVerificationFailed(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const CLIENT_ID: &str = "test-client.apps.googleusercontent.com";
    const TEST_KEY_PEM: &str = include_str!("testdata/rsa_test_key.pem");
    const TEST_JWKS: &str = include_str!("testdata/rsa_test_jwks.json");

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        aud: &'a str,
        iss: &'a str,
        exp: i64,
        iat: i64,
        email: Option<&'a str>,
        name: Option<&'a str>,
    }

    fn verifier() -> GoogleVerifier {
        let set: JwkSet = serde_json::from_str(TEST_JWKS).unwrap();
        GoogleVerifier::with_keys(CLIENT_ID.to_string(), set)
    }

    /// Refetching verifier whose key endpoint refuses connections
    fn unreachable_verifier(fetched_at: Instant) -> GoogleVerifier {
        let set: JwkSet = serde_json::from_str(TEST_JWKS).unwrap();
        let verifier = GoogleVerifier::new(
            reqwest::Client::new(),
            CLIENT_ID.to_string(),
            "http://127.0.0.1:1/certs".to_string(),
        );
        GoogleVerifier {
            keys: RwLock::new(Some(CachedKeys { set, fetched_at })),
            ..verifier
        }
    }

    fn failure_message(result: ApiResult<IdentityClaims>) -> String {
        match result {
            Err(ApiError::ProviderVerificationFailed(message)) => message,
            other => panic!("expected verification failure, got {:?}", other.map(|c| c.subject)),
        }
    }

    fn sign(kid: Option<&str>, aud: &str, iss: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let claims = TestClaims {
            sub: "g-123",
            aud,
            iss,
            exp: now + exp_offset,
            iat: now,
            email: Some("citizen@example.com"),
            name: Some("Test Citizen"),
        };
        encode(
            &header,
            &claims,
            &EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_yields_claims() {
        let token = sign(Some("test-key-1"), CLIENT_ID, "https://accounts.google.com", 600);
        let claims = verifier().verify(&token).await.unwrap();
        assert_eq!(claims.subject, "g-123");
        assert_eq!(claims.email.as_deref(), Some("citizen@example.com"));
        assert_eq!(claims.display_name.as_deref(), Some("Test Citizen"));
    }

    #[tokio::test]
    async fn test_bare_issuer_is_accepted() {
        let token = sign(Some("test-key-1"), CLIENT_ID, "accounts.google.com", 600);
        assert!(verifier().verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_audience_is_rejected() {
        let token = sign(Some("test-key-1"), "someone-else", "accounts.google.com", 600);
        let result = verifier().verify(&token).await;
        assert!(matches!(result, Err(ApiError::ProviderVerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_wrong_issuer_is_rejected() {
        let token = sign(Some("test-key-1"), CLIENT_ID, "https://evil.example", 600);
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let token = sign(Some("test-key-1"), CLIENT_ID, "accounts.google.com", -3600);
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_or_missing_key_id_is_rejected() {
        let token = sign(Some("rotated-away"), CLIENT_ID, "accounts.google.com", 600);
        assert!(verifier().verify(&token).await.is_err());

        let token = sign(None, CLIENT_ID, "accounts.google.com", 600);
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_key_id_does_not_refetch_recent_keys() {
        let verifier = unreachable_verifier(Instant::now());
        let token = sign(Some("rotated-away"), CLIENT_ID, "accounts.google.com", 600);

        for _ in 0..3 {
            let message = failure_message(verifier.verify(&token).await);
            assert!(message.contains("unknown signing key"), "{}", message);
        }

        // known keys still verify from the cache
        let token = sign(Some("test-key-1"), CLIENT_ID, "accounts.google.com", 600);
        assert!(verifier.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_key_id_refetches_older_keys() {
        let fetched_at = Instant::now() - Duration::from_secs(120);
        let verifier = unreachable_verifier(fetched_at);
        let token = sign(Some("rotated-away"), CLIENT_ID, "accounts.google.com", 600);

        let message = failure_message(verifier.verify(&token).await);
        assert!(message.contains("failed to fetch"), "{}", message);
    }

    #[tokio::test]
    async fn test_hmac_token_is_rejected() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("test-key-1".to_string());
        let token = encode(
            &header,
            &serde_json::json!({ "sub": "g-123", "aud": CLIENT_ID, "iss": "accounts.google.com", "exp": 9999999999i64 }),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        let result = verifier().verify(&token).await;
        assert!(matches!(result, Err(ApiError::ProviderVerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        assert!(verifier().verify("not.a.jwt").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_client_id_is_rejected() {
        let set: JwkSet = serde_json::from_str(TEST_JWKS).unwrap();
        let verifier = GoogleVerifier::with_keys(String::new(), set);
        let token = sign(Some("test-key-1"), CLIENT_ID, "accounts.google.com", 600);
        assert!(verifier.verify(&token).await.is_err());
    }
}
