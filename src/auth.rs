/// Authentication extractors
use crate::{
    account::AuthenticatedUser,
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::ApiError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - extracts and authorizes the bearer app token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: AuthenticatedUser,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Authentication("Missing authorization header".to_string()))?;

        // Signature alone is not enough; the token must still be cached
        let user = state.auth_manager.authorize(&token).await?;

        Ok(AuthContext { user })
    }
}
