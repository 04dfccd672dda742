/// User profile endpoints
use crate::{account::UserProfile, auth::AuthContext, context::AppContext, error::ApiResult};
use axum::{extract::State, routing::get, Json, Router};

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/users/me", get(me))
}

/// Current user's profile
async fn me(State(ctx): State<AppContext>, auth: AuthContext) -> ApiResult<Json<UserProfile>> {
    let user = ctx.auth_manager.get_user(auth.user.user_id).await?;
    Ok(Json(user.into()))
}
