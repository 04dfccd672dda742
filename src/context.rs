/// Application context and dependency injection
use crate::{
    account::AuthManager,
    cache::{AppTokenCache, CacheClient, MemoryTokenStore, RedisTokenStore, TokenStore},
    config::ServerConfig,
    db,
    error::ApiResult,
    identity::ProviderVerifiers,
    jwt::{JwtConfig, JwtIssuer},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub auth_manager: Arc<AuthManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        // Initialize database
        let db = db::create_pool(
            &config.storage.database_path,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        // App-token store: Redis when enabled, process memory otherwise
        let token_store: Arc<dyn TokenStore> = if config.cache.enabled {
            let client = CacheClient::new(config.cache.clone()).await?;
            tracing::info!("App-token cache backed by Redis");
            Arc::new(RedisTokenStore::new(client))
        } else {
            tracing::warn!("Redis cache disabled; app tokens are kept in process memory");
            Arc::new(MemoryTokenStore::new())
        };

        let verifiers = ProviderVerifiers::from_config(&config.providers)?;

        Ok(Self::from_parts(config, db, verifiers, token_store))
    }

    /// Assemble a context from already-built stores and verifiers
    pub fn from_parts(
        config: ServerConfig,
        db: SqlitePool,
        verifiers: ProviderVerifiers,
        token_store: Arc<dyn TokenStore>,
    ) -> Self {
        let auth = &config.authentication;

        let jwt = JwtIssuer::new(JwtConfig {
            secret: auth.jwt_secret.clone(),
            issuer: auth.jwt_issuer.clone(),
            ttl: chrono::Duration::seconds(auth.app_token_ttl_secs as i64),
        });
        let cache = AppTokenCache::new(token_store, Duration::from_secs(auth.app_token_ttl_secs));

        let auth_manager = Arc::new(AuthManager::new(
            db.clone(),
            verifiers,
            jwt,
            cache,
            chrono::Duration::days(auth.session_ttl_days),
        ));

        Self {
            config: Arc::new(config),
            db,
            auth_manager,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
