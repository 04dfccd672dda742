/// Redis-based caching layer for the auth service
///
/// Holds the ephemeral half of the session model: issued app tokens and
/// upstream provider tokens, keyed by user id with a TTL per entry.

mod app_token;
mod token_store;

pub use app_token::{AppTokenCache, TokenNamespace};
pub use token_store::{MemoryTokenStore, RedisTokenStore, TokenStore};

use crate::error::{ApiError, ApiResult};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Cache layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Use Redis; when false tokens live in process memory
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub redis_url: String,

    /// Key prefix for all cache entries (default: "pbmap:")
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "pbmap:".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("CACHE_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("CACHE_KEY_PREFIX")
                .unwrap_or_else(|_| "pbmap:".to_string()),
        }
    }
}

/// Redis cache client
#[derive(Clone)]
pub struct CacheClient {
    connection: ConnectionManager,
    config: CacheConfig,
}

impl CacheClient {
    /// Create a new cache client
    pub async fn new(config: CacheConfig) -> ApiResult<Self> {
        if !config.enabled {
            return Err(ApiError::Internal(
                "Cache is disabled, cannot create client".to_string(),
            ));
        }

        info!("Connecting to Redis at {}", config.redis_url);

        let client = Client::open(config.redis_url.as_str()).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            ApiError::Cache(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            ApiError::Cache(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self { connection, config })
    }

    /// Build a cache key with prefix
    fn build_key(&self, category: &str, key: &str) -> String {
        build_key(&self.config.key_prefix, category, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, category: &str, key: &str) -> ApiResult<Option<T>> {
        let cache_key = self.build_key(category, key);

        debug!("Cache GET: {}", cache_key);

        let mut conn = self.connection.clone();
        let result: Option<String> = conn.get(&cache_key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", cache_key, e);
            ApiError::Cache(format!("Cache get failed: {}", e))
        })?;

        match result {
            Some(json) => {
                debug!("Cache HIT: {}", cache_key);
                match serde_json::from_str(&json) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        warn!("Failed to deserialize cached value: {}", e);
                        // Delete corrupted cache entry
                        let _ = self.delete(category, key).await;
                        Ok(None)
                    }
                }
            }
            None => {
                debug!("Cache MISS: {}", cache_key);
                Ok(None)
            }
        }
    }

    /// Set a value in cache with TTL
    pub async fn set<T: Serialize>(
        &self,
        category: &str,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> ApiResult<()> {
        let cache_key = self.build_key(category, key);

        debug!("Cache SET: {} (TTL: {}s)", cache_key, ttl_secs);

        let json = serde_json::to_string(value).map_err(|e| {
            error!("Failed to serialize value for cache: {}", e);
            ApiError::Cache(format!("Cache serialization failed: {}", e))
        })?;

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&cache_key, json, ttl_secs)
            .await
            .map_err(|e| {
                warn!("Redis SET failed for {}: {}", cache_key, e);
                ApiError::Cache(format!("Cache set failed: {}", e))
            })?;

        Ok(())
    }

    /// Delete a value from cache
    pub async fn delete(&self, category: &str, key: &str) -> ApiResult<()> {
        let cache_key = self.build_key(category, key);

        debug!("Cache DELETE: {}", cache_key);

        let mut conn = self.connection.clone();
        conn.del::<_, ()>(&cache_key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", cache_key, e);
            ApiError::Cache(format!("Cache delete failed: {}", e))
        })?;

        Ok(())
    }

    /// Ping Redis to check connection
    pub async fn ping(&self) -> ApiResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            error!("Redis PING failed: {}", e);
            ApiError::Cache(format!("Cache ping failed: {}", e))
        })?;

        if pong != "PONG" {
            return Err(ApiError::Cache(
                "Unexpected Redis PING response".to_string(),
            ));
        }

        Ok(())
    }
}

fn build_key(prefix: &str, category: &str, key: &str) -> String {
    format!("{}{}{}", prefix, category, key)
}

/// Cache category constants
pub mod categories {
    pub const APP_TOKEN: &str = "app_token:";
    pub const UPSTREAM_TOKEN: &str = "upstream_token:";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.key_prefix, "pbmap:");
    }

    #[test]
    fn test_build_key() {
        let key = build_key("pbmap:", categories::APP_TOKEN, "42");
        assert_eq!(key, "pbmap:app_token:42");
    }

    #[tokio::test]
    async fn test_disabled_cache_refuses_client() {
        let result = CacheClient::new(CacheConfig::default()).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }
}
