use std::collections::HashMap;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Top-level LLM configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// LLM provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
}

/// Configuration for a single LLM provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Provider protocol family
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override (also how OpenAI-compatible vendors are pointed at)
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model configuration
    #[serde(default)]
    pub models: ModelConfig,
    /// Forward the client's bearer token to the provider
    #[serde(default)]
    pub forward_authorization: bool,
    /// Per-attempt request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Supported LLM provider protocol families
///
/// One entry per upstream wire format; vendors sharing a format (Groq,
/// Fireworks, Cerebras, xAI, Mistral, Azure-OpenAI, ...) configure the
/// `openai` family with their own `base_url`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderType {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
}

/// Model configuration for a provider
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Include models matching these patterns (regex)
    #[serde(default)]
    pub include: Vec<String>,
    /// Exclude models matching these patterns (regex)
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Per-model overrides
    #[serde(default)]
    pub overrides: HashMap<String, ModelOverride>,
}

/// Per-model configuration overrides
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOverride {
    /// Custom display name
    #[serde(default)]
    pub alias: Option<String>,
}

const fn default_timeout_seconds() -> u64 {
    120
}
