#![allow(clippy::must_use_candidate)]

pub mod cache;
pub mod conversation;
mod env;
pub mod fallback;
pub mod llm;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use cache::*;
pub use conversation::*;
pub use fallback::*;
pub use llm::*;
pub use server::*;
pub use telemetry::TelemetryConfig;

/// Top-level Conduit configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Fallback policy configuration
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Response cache configuration
    #[serde(default)]
    pub cache: Option<ResponseCacheConfig>,
    /// Conversation correlation configuration
    #[serde(default)]
    pub conversation: Option<ConversationConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
