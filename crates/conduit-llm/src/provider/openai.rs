//! OpenAI-compatible provider adapter
//!
//! Serves the canonical OpenAI API and every vendor speaking its wire
//! format (Azure-OpenAI, Mistral, Groq, Cerebras, Fireworks, xAI, ...)
//! via a configured `base_url`.

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
use crate::convert::openai::openai_chunk_to_events;
use crate::error::{ErrorKind, ProviderFailure};
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Whether the configured endpoint is the canonical OpenAI API
///
/// Some compatible vendors reject `stream_options`, so it is only sent
/// to the canonical host.
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// OpenAI-compatible provider adapter
pub struct OpenAiProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    forward_authorization: bool,
    timeout: Duration,
}

impl OpenAiProvider {
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

    /// Build the chat completions URL
    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    async fn send(
        &self,
        wire_request: &OpenAiRequest,
        context: &RequestContext,
    ) -> Result<reqwest::Response, ProviderFailure> {
        let mut builder = self.client.post(self.completions_url()).json(wire_request);

        if let Some(key) = self.resolve_api_key(context) {
            builder = builder.bearer_auth(key);
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
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calls: true,
            structured_output: true,
            json_mode: true,
            max_context_tokens: None,
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
        let wire_request: OpenAiRequest = request.into();

        let response = self.send(&wire_request, context).await?;

        let wire_response: OpenAiResponse = response.json().await.map_err(|e| {
            ProviderFailure::new(ErrorKind::Unknown, format!("failed to parse response: {e}"))
        })?;

        Ok(wire_response.into())
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<ChunkStream, ProviderFailure> {
        let mut wire_request: OpenAiRequest = request.into();
        wire_request.stream = Some(true);

        wire_request.stream_options = if is_canonical_openai(&self.base_url) {
            Some(OpenAiStreamOptions { include_usage: true })
        } else {
            None
        };

        let response = self.send(&wire_request, context).await?;

        let event_stream = response.bytes_stream().eventsource();

        let mapped = event_stream
            .map(|result| match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data == "[DONE]" {
                        return vec![Ok(StreamEvent::Done)];
                    }

                    match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                        Ok(chunk) => openai_chunk_to_events(&chunk).into_iter().map(Ok).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
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
