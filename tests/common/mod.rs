//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response};
use axum::Router;
use pbmap_auth::{
    cache::{CacheConfig, MemoryTokenStore},
    config::{
        AuthConfig, JobsConfig, LoggingConfig, ProviderConfig, ServerConfig, ServiceConfig,
        StorageConfig,
    },
    context::AppContext,
    db,
    error::{ApiError, ApiResult},
    identity::{IdentityClaims, IdentityVerifier, ProviderVerifiers},
    server,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-secret-key-0123456789abcdef";
pub const JWT_ISSUER: &str = "pbmap_api";

/// Credential the stub verifiers always reject.
pub const BAD_CREDENTIAL: &str = "rejected-credential";

/// Verifier that treats the credential itself as the provider subject.
pub struct StubVerifier {
    pub prefix: &'static str,
}

#[async_trait]
impl IdentityVerifier for StubVerifier {
    async fn verify(&self, credential: &str) -> ApiResult<IdentityClaims> {
        if credential == BAD_CREDENTIAL {
            return Err(ApiError::ProviderVerificationFailed(
                "stub rejected credential".to_string(),
            ));
        }

        Ok(IdentityClaims {
            subject: format!("{}{}", self.prefix, credential),
            email: Some(format!("{}@example.com", credential)),
            display_name: Some(format!("User {}", credential)),
        })
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
        },
        storage: StorageConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
        },
        authentication: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            jwt_issuer: JWT_ISSUER.to_string(),
            app_token_ttl_secs: 259_200,
            session_ttl_days: 30,
        },
        providers: ProviderConfig {
            google_client_id: "test-client".to_string(),
            google_jwks_url: "http://127.0.0.1:1/certs".to_string(),
            line_channel_id: "1234567890".to_string(),
            line_verify_url: "http://127.0.0.1:1/verify".to_string(),
            http_timeout_secs: 1,
        },
        cache: CacheConfig::default(),
        jobs: JobsConfig {
            session_cleanup_interval_secs: 3600,
            health_check_interval_secs: 300,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            json: false,
        },
    }
}

/// Context over a migrated in-memory database, an in-memory token store and
/// stub provider verifiers. Google subjects equal the credential; LINE
/// subjects are prefixed with `U`.
pub async fn test_context() -> (AppContext, Arc<MemoryTokenStore>) {
    let pool = db::create_memory_pool().await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let store = Arc::new(MemoryTokenStore::new());
    let verifiers = ProviderVerifiers::new(
        Arc::new(StubVerifier { prefix: "" }),
        Arc::new(StubVerifier { prefix: "U" }),
    );

    let ctx = AppContext::from_parts(test_config(), pool, verifiers, store.clone());
    (ctx, store)
}

pub async fn test_app() -> (Router, AppContext) {
    let (ctx, _) = test_context().await;
    (server::build_router(ctx.clone()), ctx)
}

pub async fn count(ctx: &AppContext, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(&ctx.db).await.unwrap()
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
