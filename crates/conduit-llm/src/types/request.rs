use std::collections::HashMap;

use conduit_cache::CachePolicy;
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::tool::{ToolChoice, ToolDefinition};

/// Parameters controlling text generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Frequency penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Random seed for deterministic generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Requested shape of the model output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text
    #[default]
    Text,
    /// Any syntactically valid JSON object
    JsonObject,
    /// JSON conforming to a caller-supplied schema
    JsonSchema {
        /// The schema specification
        json_schema: JsonSchemaSpec,
    },
}

impl ResponseFormat {
    /// The caller-supplied schema, when this format carries one
    pub const fn schema_spec(&self) -> Option<&JsonSchemaSpec> {
        match self {
            Self::JsonSchema { json_schema } => Some(json_schema),
            Self::Text | Self::JsonObject => None,
        }
    }
}

/// Caller-supplied JSON Schema for structured output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaSpec {
    /// Schema name, passed through to providers that require one
    pub name: String,
    /// The JSON Schema itself
    pub schema: serde_json::Value,
    /// Whether the provider should enforce the schema strictly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Caller-requested fallback behavior for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Candidate selection keyed by the classified error
    #[default]
    Auto,
    /// One attempt; any failure is terminal
    Never,
    /// Try exactly these candidates, in order
    Explicit(Vec<ModelRef>),
}

/// Reference to a model, optionally pinned to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider name; absent means "resolve like a bare model name"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model identifier
    pub model: String,
}

impl ModelRef {
    /// Parse a `provider/model` or bare `model` reference
    pub fn parse(raw: &str) -> Self {
        raw.split_once('/').map_or_else(
            || Self {
                provider: None,
                model: raw.to_owned(),
            },
            |(provider, model)| Self {
                provider: Some(provider.to_owned()),
                model: model.to_owned(),
            },
        )
    }
}

/// Reasoning budget for models that expose deliberation controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningSpec {
    /// Coarse effort level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,
    /// Explicit token budget for deliberation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<u32>,
}

/// Coarse reasoning effort level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Minimal deliberation
    Low,
    /// Balanced deliberation
    Medium,
    /// Extensive deliberation
    High,
}

/// Internal canonical completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Generation parameters
    #[serde(default)]
    pub params: CompletionParams,
    /// Tool definitions available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// How the model should select tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Requested output shape
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Reasoning budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningSpec>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
    /// Caller-requested cache behavior
    #[serde(default)]
    pub cache: CachePolicy,
    /// Caller-requested fallback behavior
    #[serde(default)]
    pub fallback: FallbackPolicy,
    /// Template variables substituted into `{{var}}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Map<String, serde_json::Value>>,
    /// Arbitrary metadata; `agent_id` and `conversation_id` are recognized
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl CompletionRequest {
    /// The explicit conversation id from metadata, if any
    pub fn explicit_conversation_id(&self) -> Option<&str> {
        self.metadata.get("conversation_id").map(String::as_str)
    }

    /// Whether any tools are attached
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}
