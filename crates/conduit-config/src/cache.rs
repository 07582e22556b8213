use serde::Deserialize;
use url::Url;

/// Response cache configuration
///
/// When no `url` is given the cache runs on an in-process store, which
/// is only suitable for single-node deployments and tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseCacheConfig {
    /// Whether caching is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Valkey connection URL (in-process store when absent)
    #[serde(default)]
    pub url: Option<Url>,
    /// TTL in seconds for cached responses; 0 means no expiry
    #[serde(default)]
    pub ttl_seconds: u64,
    /// Key prefix in Valkey
    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,
}

fn default_cache_prefix() -> String {
    "conduit:cache".to_owned()
}
