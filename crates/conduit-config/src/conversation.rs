use serde::Deserialize;
use url::Url;

/// Conversation correlation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Whether conversation correlation is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Valkey connection URL (in-process store when absent)
    #[serde(default)]
    pub url: Option<Url>,
    /// Seconds a transcript hash stays matchable after the response is stored
    #[serde(default = "default_conversation_ttl")]
    pub ttl_seconds: u64,
    /// Key prefix in Valkey
    #[serde(default = "default_conversation_prefix")]
    pub key_prefix: String,
}

const fn default_conversation_ttl() -> u64 {
    3600
}

fn default_conversation_prefix() -> String {
    "conduit:conv".to_owned()
}
