/// Background task implementations
use crate::{
    api::health,
    context::AppContext,
    error::{ApiError, ApiResult},
};

/// Delete sessions whose expiry has passed
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> ApiResult<u64> {
    ctx.auth_manager.cleanup_expired_sessions().await
}

/// Health check - verify the database and cache answer
pub async fn health_check(ctx: &AppContext) -> ApiResult<()> {
    let status = health::check_components(ctx).await;

    if status.is_healthy() {
        return Ok(());
    }

    let failures: Vec<String> = status
        .checks
        .iter()
        .filter_map(|c| c.error.as_ref().map(|e| format!("{}: {}", c.name, e)))
        .collect();

    Err(ApiError::Internal(failures.join("; ")))
}
