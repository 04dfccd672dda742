/// Token store backends for the app-token cache
use super::{categories, CacheClient};
use crate::{cache::TokenNamespace, error::ApiResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Single-key, TTL-based string store
///
/// Every operation touches exactly one key; there is no multi-key atomicity.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn set(
        &self,
        namespace: TokenNamespace,
        user_id: &str,
        value: &str,
        ttl: Duration,
    ) -> ApiResult<()>;

    async fn get(&self, namespace: TokenNamespace, user_id: &str) -> ApiResult<Option<String>>;

    async fn delete(&self, namespace: TokenNamespace, user_id: &str) -> ApiResult<()>;

    /// Backend liveness check
    async fn ping(&self) -> ApiResult<()> {
        Ok(())
    }
}

fn category(namespace: TokenNamespace) -> &'static str {
    match namespace {
        TokenNamespace::App => categories::APP_TOKEN,
        TokenNamespace::Upstream => categories::UPSTREAM_TOKEN,
    }
}

/// Redis-backed token store
#[derive(Clone)]
pub struct RedisTokenStore {
    client: CacheClient,
}

impl RedisTokenStore {
    pub fn new(client: CacheClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn set(
        &self,
        namespace: TokenNamespace,
        user_id: &str,
        value: &str,
        ttl: Duration,
    ) -> ApiResult<()> {
        // SET EX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        self.client
            .set(category(namespace), user_id, &value, ttl_secs)
            .await
    }

    async fn get(&self, namespace: TokenNamespace, user_id: &str) -> ApiResult<Option<String>> {
        self.client.get::<String>(category(namespace), user_id).await
    }

    async fn delete(&self, namespace: TokenNamespace, user_id: &str) -> ApiResult<()> {
        self.client.delete(category(namespace), user_id).await
    }

    async fn ping(&self) -> ApiResult<()> {
        self.client.ping().await
    }
}

/// Process-local token store
///
/// Entries expire lazily: an expired entry is dropped on the read that finds it.
/// Only suitable for a single instance or for tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<(TokenNamespace, String), (String, Instant)>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, deadline)| *deadline > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn set(
        &self,
        namespace: TokenNamespace,
        user_id: &str,
        value: &str,
        ttl: Duration,
    ) -> ApiResult<()> {
        let deadline = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert((namespace, user_id.to_string()), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, namespace: TokenNamespace, user_id: &str) -> ApiResult<Option<String>> {
        let key = (namespace, user_id.to_string());
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                None => return Ok(None),
                Some((value, deadline)) if *deadline > Instant::now() => {
                    return Ok(Some(value.clone()))
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if let Some((_, deadline)) = entries.get(&key) {
            if *deadline <= Instant::now() {
                entries.remove(&key);
            }
        }
        Ok(None)
    }

    async fn delete(&self, namespace: TokenNamespace, user_id: &str) -> ApiResult<()> {
        self.entries
            .write()
            .await
            .remove(&(namespace, user_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_namespaces_are_independent() {
        let store = MemoryTokenStore::new();
        let ttl = Duration::from_secs(60);

        store.set(TokenNamespace::App, "u1", "app-token", ttl).await.unwrap();
        store
            .set(TokenNamespace::Upstream, "u1", "provider-token", ttl)
            .await
            .unwrap();

        store.delete(TokenNamespace::App, "u1").await.unwrap();

        assert_eq!(store.get(TokenNamespace::App, "u1").await.unwrap(), None);
        assert_eq!(
            store.get(TokenNamespace::Upstream, "u1").await.unwrap(),
            Some("provider-token".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_expires_entries() {
        let store = MemoryTokenStore::new();
        store
            .set(TokenNamespace::App, "u1", "token", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.get(TokenNamespace::App, "u1").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_overwrites_value() {
        let store = MemoryTokenStore::new();
        let ttl = Duration::from_secs(60);
        store.set(TokenNamespace::App, "u1", "first", ttl).await.unwrap();
        store.set(TokenNamespace::App, "u1", "second", ttl).await.unwrap();
        assert_eq!(
            store.get(TokenNamespace::App, "u1").await.unwrap(),
            Some("second".to_string())
        );
    }
}
