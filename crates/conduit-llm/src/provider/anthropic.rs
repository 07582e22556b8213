//! Anthropic Messages API provider adapter

use std::time::Duration;

use async_trait::async_trait;
use conduit_config::LlmProviderConfig;
use conduit_core::RequestContext;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ChunkStream, Provider, ProviderCapabilities};
use crate::convert::anthropic::AnthropicStreamState;
use crate::error::{ErrorKind, ProviderFailure};
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};
use crate::types::{CompletionRequest, CompletionResponse};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider adapter
pub struct AnthropicProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    forward_authorization: bool,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Create from provider configuration
    pub fn new(name: String, config: &LlmProviderConfig) -> Result<Self, crate::error::GatewayError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Ok(Self {
            name,
            client: Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            forward_authorization: config.forward_authorization,
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    /// Resolve the API key from config or request context
    fn resolve_api_key(&self, context: &RequestContext) -> Option<String> {
        if self.forward_authorization
            && let Some(key) = &context.api_key
        {
            return Some(key.expose_secret().to_owned());
        }
        self.api_key.as_ref().map(|k| k.expose_secret().to_owned())
    }

    /// Build the messages endpoint URL
    fn messages_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/messages")
    }

    async fn send(
        &self,
        wire_request: &AnthropicRequest,
        context: &RequestContext,
    ) -> Result<reqwest::Response, ProviderFailure> {
        let mut builder = self
            .client
            .post(self.messages_url())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(wire_request);

        if let Some(key) = self.resolve_api_key(context) {
            builder = builder.header("x-api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| super::failure_from_transport(&self.name, &e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(super::failure_from_response(&self.name, status, body));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        // No native json_schema response format; structured output is
        // prompt-injected and validated post-hoc
        ProviderCapabilities {
            streaming: true,
            tool_calls: true,
            structured_output: false,
            json_mode: false,
            max_context_tokens: Some(200_000),
            max_output_tokens: None,
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<CompletionResponse, ProviderFailure> {
        let wire_request: AnthropicRequest = request.into();

        let response = self.send(&wire_request, context).await?;

        let wire_response: AnthropicResponse = response.json().await.map_err(|e| {
            ProviderFailure::new(ErrorKind::Unknown, format!("failed to parse response: {e}"))
        })?;

        Ok(wire_response.into())
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<ChunkStream, ProviderFailure> {
        let mut wire_request: AnthropicRequest = request.into();
        wire_request.stream = Some(true);

        let response = self.send(&wire_request, context).await?;

        let event_stream = response.bytes_stream().eventsource();
        let mut state = AnthropicStreamState::new();

        let mapped = event_stream
            .map(move |result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return vec![];
                    }

                    match serde_json::from_str::<AnthropicStreamEvent>(data) {
                        Ok(stream_event) => state.convert_event(&stream_event).into_iter().map(Ok).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unparseable Anthropic SSE event");
                            vec![]
                        }
                    }
                }
                Err(e) => vec![Err(ProviderFailure::new(ErrorKind::TransientNetwork, e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(mapped))
    }
}
