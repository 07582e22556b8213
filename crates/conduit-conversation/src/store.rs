//! Conversation store backends
//!
//! The critical operation is `take`: an atomic get-and-delete. Two
//! concurrent requests probing the same transcript hash must not both
//! consume the entry; Valkey's `GETDEL` and `DashMap::remove` both
//! hand the value to exactly one caller.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::ConversationEntry;

/// Conversation store errors
#[derive(Debug, Error)]
pub enum ConversationStoreError {
    /// Valkey connection or command error
    #[error("conversation store backend: {0}")]
    Backend(String),
    /// Serialization error
    #[error("serialization: {0}")]
    Serialization(String),
}

/// Expiring map of transcript hash to conversation entry
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Store an entry under a transcript hash with the given TTL
    async fn put(
        &self,
        hash: &str,
        entry: &ConversationEntry,
        ttl: Duration,
    ) -> Result<(), ConversationStoreError>;

    /// Atomically remove and return the entry for a transcript hash
    async fn take(&self, hash: &str) -> Result<Option<ConversationEntry>, ConversationStoreError>;
}

/// Conversation store backed by Valkey
pub struct ValkeyConversationStore {
    client: redis::Client,
    key_prefix: String,
}

impl ValkeyConversationStore {
    /// Create a new Valkey-backed store
    ///
    /// # Errors
    ///
    /// Returns an error if the Valkey URL is invalid
    pub fn new(url: &str, key_prefix: String) -> Result<Self, ConversationStoreError> {
        let client =
            redis::Client::open(url).map_err(|e| ConversationStoreError::Backend(format!("invalid URL: {e}")))?;

        Ok(Self { client, key_prefix })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, ConversationStoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ConversationStoreError::Backend(format!("connection failed: {e}")))
    }

    fn full_key(&self, hash: &str) -> String {
        format!("{}:{hash}", self.key_prefix)
    }
}

#[async_trait]
impl ConversationStore for ValkeyConversationStore {
    async fn put(
        &self,
        hash: &str,
        entry: &ConversationEntry,
        ttl: Duration,
    ) -> Result<(), ConversationStoreError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let data = serde_json::to_string(entry)
            .map_err(|e| ConversationStoreError::Serialization(format!("serialize: {e}")))?;

        let _: () = conn
            .set_ex(self.full_key(hash), &data, ttl.as_secs().max(1))
            .await
            .map_err(|e| ConversationStoreError::Backend(format!("SET failed: {e}")))?;

        Ok(())
    }

    async fn take(&self, hash: &str) -> Result<Option<ConversationEntry>, ConversationStoreError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        // GETDEL is the atomic consume: at most one caller sees the value
        let result: Option<String> = conn
            .get_del(self.full_key(hash))
            .await
            .map_err(|e| ConversationStoreError::Backend(format!("GETDEL failed: {e}")))?;

        result
            .map(|data| {
                serde_json::from_str(&data)
                    .map_err(|e| ConversationStoreError::Serialization(format!("deserialize: {e}")))
            })
            .transpose()
    }
}

/// In-process conversation store for tests and embedded use
#[derive(Default)]
pub struct MemoryConversationStore {
    entries: DashMap<String, (ConversationEntry, Instant)>,
}

impl MemoryConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn put(
        &self,
        hash: &str,
        entry: &ConversationEntry,
        ttl: Duration,
    ) -> Result<(), ConversationStoreError> {
        self.entries.insert(hash.to_owned(), (entry.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn take(&self, hash: &str) -> Result<Option<ConversationEntry>, ConversationStoreError> {
        let Some((_, (entry, expires_at))) = self.entries.remove(hash) else {
            return Ok(None);
        };

        if Instant::now() >= expires_at {
            return Ok(None);
        }

        Ok(Some(entry))
    }
}
