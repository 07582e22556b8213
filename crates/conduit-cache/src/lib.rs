//! Exact-match response cache for LLM completions
//!
//! Deduplicates identical computations: a completed response is stored
//! under a two-part key, an input hash over the canonicalized message
//! list (or template plus resolved variables) and a version hash over
//! the generation parameters that change the output. Writes are
//! idempotent overwrites and the store holds no locks; two racing
//! identical requests may both compute and both store, which is
//! harmless because the value per key is immutable.

mod store;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use store::{CacheStore, MemoryCacheStore, ValkeyCacheStore};

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Valkey connection or command error
    #[error("cache backend: {0}")]
    Backend(String),
    /// Serialization error
    #[error("serialization: {0}")]
    Serialization(String),
}

/// Caller-requested cache behavior for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Cache only deterministic requests (temperature 0, no tools)
    #[default]
    Auto,
    /// Always look up and store, regardless of sampling params
    Always,
    /// Bypass the cache entirely
    Never,
}

/// Two-part key identifying a cacheable unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Hash of the resolved request content
    pub input_hash: String,
    /// Hash of the generation parameters that change the output
    pub version_hash: String,
}

impl CacheKey {
    /// Compute a key from serializable input and version material
    ///
    /// The caller decides what goes into each part; see the orchestrator
    /// for the canonical composition.
    pub fn new<I: Serialize, V: Serialize>(input: &I, version: &V) -> Self {
        Self {
            input_hash: content_hash(input),
            version_hash: content_hash(version),
        }
    }

    /// Flat representation used as the backing-store key
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.input_hash, self.version_hash)
    }
}

/// Cached response entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Serialized response body (JSON)
    pub body: String,
    /// Model that produced the response
    pub model: String,
    /// Provider that served the request
    pub provider: String,
}

/// SHA-256 hash of a value's canonical JSON representation
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let hash = Sha256::digest(json.as_bytes());
    format!("{hash:x}")
}

/// Whether a request is eligible for cache lookup and store
///
/// `always` overrides sampling params; `auto` requires a deterministic
/// request (temperature exactly 0) with no tools attached.
#[must_use]
pub fn is_cacheable(policy: CachePolicy, temperature: Option<f64>, has_tools: bool) -> bool {
    match policy {
        CachePolicy::Never => false,
        CachePolicy::Always => true,
        CachePolicy::Auto => temperature == Some(0.0) && !has_tools,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_deterministic() {
        let data = serde_json::json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]});
        assert_eq!(content_hash(&data), content_hash(&data));
    }

    #[test]
    fn content_hash_differs_for_different_input() {
        let a = serde_json::json!([{"role": "user", "content": "hi"}]);
        let b = serde_json::json!([{"role": "user", "content": "bye"}]);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn key_separates_input_and_version() {
        let messages = serde_json::json!([{"role": "user", "content": "hi"}]);
        let v1 = serde_json::json!({"model": "gpt-4o", "temperature": 0.0});
        let v2 = serde_json::json!({"model": "gpt-4o-mini", "temperature": 0.0});

        let k1 = CacheKey::new(&messages, &v1);
        let k2 = CacheKey::new(&messages, &v2);
        assert_eq!(k1.input_hash, k2.input_hash);
        assert_ne!(k1.version_hash, k2.version_hash);
        assert_ne!(k1.storage_key(), k2.storage_key());
    }

    #[test]
    fn is_cacheable_policy_matrix() {
        // `never` wins over everything
        assert!(!is_cacheable(CachePolicy::Never, Some(0.0), false));

        // `always` ignores sampling params and tools
        assert!(is_cacheable(CachePolicy::Always, Some(0.9), true));
        assert!(is_cacheable(CachePolicy::Always, None, false));

        // `auto` requires temperature == 0 and no tools
        assert!(is_cacheable(CachePolicy::Auto, Some(0.0), false));
        assert!(!is_cacheable(CachePolicy::Auto, Some(0.7), false));
        assert!(!is_cacheable(CachePolicy::Auto, None, false));
        assert!(!is_cacheable(CachePolicy::Auto, Some(0.0), true));
    }
}
