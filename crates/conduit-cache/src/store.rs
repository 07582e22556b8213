//! Cache store backends
//!
//! The store is externally owned shared state: every gateway process
//! talks to the same Valkey instance, last write wins. The in-memory
//! store exists for tests and single-node deployments.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{CacheError, CacheKey, CachedResponse};

/// Key/value lookup of (input hash, version hash) to a cached response
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a cached response
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError>;

    /// Store a response (idempotent overwrite)
    async fn put(&self, key: &CacheKey, entry: &CachedResponse) -> Result<(), CacheError>;
}

/// Cache store backed by Valkey
pub struct ValkeyCacheStore {
    client: redis::Client,
    ttl: Duration,
    key_prefix: String,
}

impl ValkeyCacheStore {
    /// Create a new Valkey-backed store
    ///
    /// A `ttl` of zero stores entries without expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the Valkey URL is invalid
    pub fn new(url: &str, ttl: Duration, key_prefix: String) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Backend(format!("invalid URL: {e}")))?;

        Ok(Self { client, ttl, key_prefix })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(format!("connection failed: {e}")))
    }

    fn full_key(&self, key: &CacheKey) -> String {
        format!("{}:{}", self.key_prefix, key.storage_key())
    }
}

#[async_trait]
impl CacheStore for ValkeyCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let result: Option<String> = conn
            .get(self.full_key(key))
            .await
            .map_err(|e| CacheError::Backend(format!("GET failed: {e}")))?;

        result.map_or_else(
            || {
                tracing::debug!(input_hash = %key.input_hash, "cache miss");
                Ok(None)
            },
            |data| {
                let entry: CachedResponse = serde_json::from_str(&data)
                    .map_err(|e| CacheError::Serialization(format!("deserialize: {e}")))?;
                tracing::debug!(input_hash = %key.input_hash, "cache hit");
                Ok(Some(entry))
            },
        )
    }

    async fn put(&self, key: &CacheKey, entry: &CachedResponse) -> Result<(), CacheError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let data =
            serde_json::to_string(entry).map_err(|e| CacheError::Serialization(format!("serialize: {e}")))?;
        let full_key = self.full_key(key);

        if self.ttl.is_zero() {
            let _: () = conn
                .set(&full_key, &data)
                .await
                .map_err(|e| CacheError::Backend(format!("SET failed: {e}")))?;
        } else {
            let _: () = conn
                .set_ex(&full_key, &data, self.ttl.as_secs())
                .await
                .map_err(|e| CacheError::Backend(format!("SET failed: {e}")))?;
        }

        tracing::debug!(input_hash = %key.input_hash, "cached response");
        Ok(())
    }
}

/// In-process cache store for tests and embedded use
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, (CachedResponse, Option<Instant>)>,
    ttl: Option<Duration>,
}

impl MemoryCacheStore {
    /// Create a store without expiry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose entries expire after `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: (!ttl.is_zero()).then_some(ttl),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let storage_key = key.storage_key();

        let Some(found) = self.entries.get(&storage_key) else {
            return Ok(None);
        };

        let (entry, expires_at) = found.value();
        if expires_at.is_some_and(|deadline| Instant::now() >= deadline) {
            drop(found);
            self.entries.remove(&storage_key);
            return Ok(None);
        }

        Ok(Some(entry.clone()))
    }

    async fn put(&self, key: &CacheKey, entry: &CachedResponse) -> Result<(), CacheError> {
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.storage_key(), (entry.clone(), expires_at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(content: &str) -> CacheKey {
        CacheKey::new(
            &serde_json::json!([{"role": "user", "content": content}]),
            &serde_json::json!({"model": "test-model", "temperature": 0.0}),
        )
    }

    fn test_entry(body: &str) -> CachedResponse {
        CachedResponse {
            body: body.to_owned(),
            model: "test-model".to_owned(),
            provider: "test".to_owned(),
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryCacheStore::new();
        let key = test_key("hello");

        assert!(store.get(&key).await.unwrap().is_none());

        store.put(&key, &test_entry("response")).await.unwrap();
        let found = store.get(&key).await.unwrap().unwrap();
        assert_eq!(found.body, "response");
    }

    #[tokio::test]
    async fn memory_store_overwrite_is_idempotent() {
        let store = MemoryCacheStore::new();
        let key = test_key("hello");

        store.put(&key, &test_entry("first")).await.unwrap();
        store.put(&key, &test_entry("first")).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().unwrap().body, "first");
    }

    #[tokio::test]
    async fn memory_store_expires_entries() {
        let store = MemoryCacheStore::with_ttl(Duration::from_millis(20));
        let key = test_key("hello");

        store.put(&key, &test_entry("response")).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get(&key).await.unwrap().is_none());
    }
}
