//! Provider adapter trait, failure classification, and registry

pub mod anthropic;
pub mod google;
pub mod openai;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_config::{LlmConfig, LlmProviderType};
use conduit_core::RequestContext;
use futures_util::Stream;

use crate::error::{ErrorKind, GatewayError, ProviderFailure};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Stream of canonical chunks from a provider
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderFailure>> + Send>>;

/// Capabilities advertised by a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    /// Whether the provider supports streaming responses
    pub streaming: bool,
    /// Whether the provider supports tool/function calling
    pub tool_calls: bool,
    /// Whether the provider accepts a JSON Schema natively
    pub structured_output: bool,
    /// Whether the provider has a schemaless JSON mode
    pub json_mode: bool,
    /// Maximum context window in tokens, when known
    pub max_context_tokens: Option<u32>,
    /// Maximum output tokens, when known
    pub max_output_tokens: Option<u32>,
}

/// Trait implemented by each upstream adapter
///
/// Beyond wire translation, the adapter's most important contract is
/// failure classification: every error leaves as a [`ProviderFailure`]
/// with exactly one [`ErrorKind`], computed here and consumed as data by
/// the fallback policy engine.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Per-attempt request timeout
    fn timeout(&self) -> Duration;

    /// Send a non-streaming completion request
    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<CompletionResponse, ProviderFailure>;

    /// Send a streaming completion request
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<ChunkStream, ProviderFailure>;
}

/// Registry of configured adapters, dispatched by provider name
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Build all adapters from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();

        for (name, provider_config) in &config.providers {
            let provider: Arc<dyn Provider> = match provider_config.provider_type {
                LlmProviderType::Openai => {
                    Arc::new(openai::OpenAiProvider::new(name.clone(), provider_config)?)
                }
                LlmProviderType::Anthropic => {
                    Arc::new(anthropic::AnthropicProvider::new(name.clone(), provider_config)?)
                }
                LlmProviderType::Google => {
                    Arc::new(google::GoogleProvider::new(name.clone(), provider_config)?)
                }
            };

            providers.insert(name.clone(), provider);
        }

        Ok(Self { providers })
    }

    /// Look up an adapter by provider name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).map(Arc::clone)
    }

    /// Names of all configured providers
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// Classify an upstream HTTP error response
///
/// Shared across adapters; each wire family produces compatible status
/// semantics. The body is only scanned for coarse markers: this runs on
/// every failure and must not parse vendor-specific error shapes.
pub fn classify_http_error(status: u16, body: &str) -> ErrorKind {
    let body_lower = body.to_lowercase();

    match status {
        429 => ErrorKind::RateLimited,
        408 => ErrorKind::TransientNetwork,
        500 | 502 | 503 | 504 | 529 => ErrorKind::ProviderDown,
        400 | 422 => {
            if body_lower.contains("content_policy")
                || body_lower.contains("content policy")
                || body_lower.contains("moderation")
                || body_lower.contains("safety")
            {
                ErrorKind::ContentModerated
            } else if body_lower.contains("response_format")
                || body_lower.contains("json_schema")
                || body_lower.contains("structured output")
                || body_lower.contains("response_schema")
            {
                ErrorKind::StructuredGenerationUnsupported
            } else {
                ErrorKind::InvalidRequest
            }
        }
        401 | 403 | 404 | 405 | 413 => ErrorKind::InvalidRequest,
        _ => ErrorKind::Unknown,
    }
}

/// Classify a transport-level failure from the HTTP client
pub fn classify_transport_error(error: &reqwest::Error) -> ErrorKind {
    if error.is_timeout() {
        ErrorKind::TransientNetwork
    } else if error.is_connect() {
        ErrorKind::ProviderDown
    } else if error.is_request() || error.is_body() || error.is_decode() {
        ErrorKind::TransientNetwork
    } else {
        ErrorKind::Unknown
    }
}

/// Build a classified failure from an upstream error response
pub(crate) fn failure_from_response(provider: &str, status: u16, body: String) -> ProviderFailure {
    let kind = classify_http_error(status, &body);
    tracing::warn!(
        provider,
        status,
        kind = kind.as_str(),
        "upstream returned error"
    );
    ProviderFailure::with_status(kind, format!("provider returned {status}: {body}"), status)
}

/// Build a classified failure from a transport error
pub(crate) fn failure_from_transport(provider: &str, error: &reqwest::Error) -> ProviderFailure {
    let kind = classify_transport_error(error);
    tracing::error!(provider, error = %error, kind = kind.as_str(), "upstream request failed");
    ProviderFailure::new(kind, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_table() {
        assert_eq!(classify_http_error(429, ""), ErrorKind::RateLimited);
        assert_eq!(classify_http_error(408, ""), ErrorKind::TransientNetwork);
        assert_eq!(classify_http_error(500, ""), ErrorKind::ProviderDown);
        assert_eq!(classify_http_error(503, ""), ErrorKind::ProviderDown);
        assert_eq!(classify_http_error(529, "overloaded"), ErrorKind::ProviderDown);
        assert_eq!(classify_http_error(401, ""), ErrorKind::InvalidRequest);
        assert_eq!(classify_http_error(404, ""), ErrorKind::InvalidRequest);
        assert_eq!(classify_http_error(418, ""), ErrorKind::Unknown);
    }

    #[test]
    fn bad_request_body_markers_refine_classification() {
        assert_eq!(
            classify_http_error(400, r#"{"error": {"message": "blocked by content policy"}}"#),
            ErrorKind::ContentModerated
        );
        assert_eq!(
            classify_http_error(400, r#"{"error": {"message": "response_format is not supported"}}"#),
            ErrorKind::StructuredGenerationUnsupported
        );
        assert_eq!(
            classify_http_error(400, r#"{"error": {"message": "missing field messages"}}"#),
            ErrorKind::InvalidRequest
        );
    }
}
