/// App-token cache: the revocation half of request authorization
use super::TokenStore;
use crate::error::{ApiError, ApiResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Independent key spaces kept per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenNamespace {
    /// Token handed to us by the identity provider
    Upstream,
    /// Token we issued to the client
    App,
}

/// Typed facade over a [`TokenStore`]
///
/// A JWT is only honoured while the `app` entry for its user holds exactly that
/// token, so deleting the entry revokes the JWT immediately.
#[derive(Clone)]
pub struct AppTokenCache {
    store: Arc<dyn TokenStore>,
    app_token_ttl: Duration,
}

impl AppTokenCache {
    pub fn new(store: Arc<dyn TokenStore>, app_token_ttl: Duration) -> Self {
        Self {
            store,
            app_token_ttl,
        }
    }

    pub async fn set(
        &self,
        namespace: TokenNamespace,
        user_id: Uuid,
        value: &str,
        ttl: Duration,
    ) -> ApiResult<()> {
        self.store
            .set(namespace, &user_id.to_string(), value, ttl)
            .await
    }

    /// Fetch an entry, `NotFound` when absent or expired
    pub async fn get(&self, namespace: TokenNamespace, user_id: Uuid) -> ApiResult<String> {
        self.store
            .get(namespace, &user_id.to_string())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("{:?} token not found", namespace)))
    }

    pub async fn delete(&self, namespace: TokenNamespace, user_id: Uuid) -> ApiResult<()> {
        self.store.delete(namespace, &user_id.to_string()).await
    }

    /// Store a freshly issued app token with the configured TTL
    pub async fn set_app_token(&self, user_id: Uuid, token: &str) -> ApiResult<()> {
        debug!("Caching app token for user {}", user_id);
        self.set(TokenNamespace::App, user_id, token, self.app_token_ttl)
            .await
    }

    pub async fn delete_app_token(&self, user_id: Uuid) -> ApiResult<()> {
        self.delete(TokenNamespace::App, user_id).await
    }

    /// Check that `presented` is the live app token for `user_id`
    pub async fn is_current(&self, user_id: Uuid, presented: &str) -> ApiResult<bool> {
        match self.get(TokenNamespace::App, user_id).await {
            Ok(stored) => Ok(stored == presented),
            Err(ApiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn ping(&self) -> ApiResult<()> {
        self.store.ping().await
    }
}
