/// Social login and token endpoints
use crate::{
    account::{LoginResponse, RefreshTokenRequest, SocialLoginRequest},
    api::middleware::validate_body,
    auth::AuthContext,
    context::AppContext,
    error::ApiResult,
};
use axum::{extract::State, routing::post, Json, Router};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
}

/// Social login endpoint
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<SocialLoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    validate_body(&req)?;
    tracing::debug!("login: {} login attempt", req.provider);

    let response = ctx.auth_manager.login_with_social(req).await?;
    Ok(Json(response))
}

/// Refresh token endpoint
async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<Json<LoginResponse>> {
    validate_body(&req)?;

    let response = ctx.auth_manager.refresh_token(req).await?;
    Ok(Json(response))
}

/// Logout endpoint
async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.auth_manager.logout(auth.user.user_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Logged out successfully"
    })))
}
