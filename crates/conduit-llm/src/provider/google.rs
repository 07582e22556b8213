//! Google Generative Language API provider adapter

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
use crate::convert::google::google_chunk_to_events;
use crate::error::{ErrorKind, ProviderFailure};
use crate::protocol::google::{GoogleRequest, GoogleResponse};
use crate::types::{CompletionRequest, CompletionResponse};

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API provider adapter
pub struct GoogleProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    forward_authorization: bool,
    timeout: Duration,
}

impl GoogleProvider {
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

    /// Build the `generateContent` endpoint URL for a model
    fn generate_url(&self, model: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/models/{model}:generateContent")
    }

    /// Build the `streamGenerateContent` endpoint URL for a model
    fn stream_url(&self, model: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/models/{model}:streamGenerateContent?alt=sse")
    }

    async fn send(
        &self,
        url: &str,
        wire_request: &GoogleRequest,
        context: &RequestContext,
    ) -> Result<reqwest::Response, ProviderFailure> {
        let mut builder = self.client.post(url).json(wire_request);

        if let Some(key) = self.resolve_api_key(context) {
            builder = builder.header("x-goog-api-key", key);
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
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calls: true,
            structured_output: true,
            json_mode: true,
            max_context_tokens: Some(1_048_576),
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
        let wire_request: GoogleRequest = request.into();
        let url = self.generate_url(&request.model);

        let response = self.send(&url, &wire_request, context).await?;

        let wire_response: GoogleResponse = response.json().await.map_err(|e| {
            ProviderFailure::new(ErrorKind::Unknown, format!("failed to parse response: {e}"))
        })?;

        let mut canonical: CompletionResponse = wire_response.into();
        // Google omits the model from responses; restore the requested one
        canonical.model.clone_from(&request.model);

        Ok(canonical)
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<ChunkStream, ProviderFailure> {
        let wire_request: GoogleRequest = request.into();
        let url = self.stream_url(&request.model);

        let response = self.send(&url, &wire_request, context).await?;

        let event_stream = response.bytes_stream().eventsource();

        let mapped = event_stream
            .map(|result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return vec![];
                    }

                    match serde_json::from_str::<GoogleResponse>(data) {
                        Ok(chunk) => google_chunk_to_events(&chunk).into_iter().map(Ok).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unparseable Google SSE chunk");
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
