/// Health check endpoints for liveness and readiness probes
///
/// Readiness checks the two stores the auth flows depend on:
/// - Database connectivity
/// - App-token cache reachability
use crate::{context::AppContext, db, error::ApiResult};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: String,

    pub version: String,

    /// Individual component checks
    pub checks: Vec<ComponentHealth>,
}

/// Health status of one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,

    /// "healthy" or "unhealthy"
    pub status: String,

    /// Response time in milliseconds
    pub response_time_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
}

/// Basic health check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe: responds while the process can serve at all
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: 200 when every dependency answers, 503 otherwise
pub async fn readiness_probe(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let health = check_components(&ctx).await;

    let status_code = if health.is_healthy() {
        StatusCode::OK
    } else {
        tracing::warn!(status = %health.status, "readiness_probe_failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Probe the database and the token cache
pub async fn check_components(ctx: &AppContext) -> HealthStatus {
    let checks = vec![
        timed("database", db::test_connection(&ctx.db)).await,
        timed("cache", ctx.auth_manager.cache().ping()).await,
    ];

    let status = if checks.iter().all(|c| c.status == "healthy") {
        "healthy"
    } else {
        "unhealthy"
    };

    HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    }
}

async fn timed<F>(name: &str, check: F) -> ComponentHealth
where
    F: Future<Output = ApiResult<()>>,
{
    let start = Instant::now();
    let result = check.await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => ComponentHealth {
            name: name.to_string(),
            status: "healthy".to_string(),
            response_time_ms,
            error: None,
        },
        Err(e) => ComponentHealth {
            name: name.to_string(),
            status: "unhealthy".to_string(),
            response_time_ms,
            error: Some(e.to_string()),
        },
    }
}
