//! Request orchestrator
//!
//! Ties the engines together for one call: conversation resolution,
//! cache check, fallback-ordered adapter attempts, structured-output
//! validation, and the commit of cache and conversation state. One
//! orchestration task runs per inbound request; fallback attempts are
//! strictly sequential so exactly one canonical response is produced.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use conduit_cache::{CacheKey, CacheStore, CachedResponse, is_cacheable};
use conduit_conversation::{ConversationHandle, Correlator, TranscriptTurn};
use conduit_core::RequestContext;
use futures_util::{SinkExt, StreamExt};

use crate::error::{ErrorKind, GatewayError, ProviderFailure};
use crate::fallback::FallbackEngine;
use crate::health::ProviderHealthTracker;
use crate::provider::{ChunkStream, ProviderRegistry};
use crate::resolve::{ModelResolver, ResolvedModel};
use crate::structured::{self, StructuredOutcome, StructuredPlan};
use crate::template;
use crate::types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, FinishReason, FunctionCall, Message, StreamDelta,
    StreamEvent, ToolCall, Usage,
};

/// Result of a non-streaming orchestration
#[derive(Debug)]
pub struct CompletionOutcome {
    /// The canonical response
    pub response: CompletionResponse,
    /// Provider that served the request ("cache" on a hit)
    pub provider: String,
    /// Whether the response came from the cache
    pub cached: bool,
}

/// Result of a streaming orchestration
pub struct StreamOutcome {
    /// Provider that serves the stream ("cache" on a replay)
    pub provider: String,
    /// Model that serves the stream
    pub model: String,
    /// Canonical chunks, flushed as produced
    pub stream: futures_util::stream::BoxStream<'static, Result<StreamEvent, GatewayError>>,
}

/// Request orchestrator over injected engines and stores
pub struct Orchestrator {
    registry: ProviderRegistry,
    resolver: ModelResolver,
    health: ProviderHealthTracker,
    fallback: FallbackEngine,
    cache: Option<Arc<dyn CacheStore>>,
    correlator: Option<Correlator>,
}

/// Per-request state carried from preparation to commit
struct PreparedRequest {
    request: CompletionRequest,
    turns: Vec<TranscriptTurn>,
    handle: Option<ConversationHandle>,
    cache_key: Option<CacheKey>,
}

/// State a streaming commit needs after the response is fully accumulated
struct StreamCommitState {
    provider: String,
    model: String,
    plan: StructuredPlan,
    cache_key: Option<CacheKey>,
    turns: Vec<TranscriptTurn>,
    handle: Option<ConversationHandle>,
}

impl Orchestrator {
    /// Assemble the orchestrator from its collaborators
    pub fn new(
        registry: ProviderRegistry,
        resolver: ModelResolver,
        health: ProviderHealthTracker,
        fallback: FallbackEngine,
        cache: Option<Arc<dyn CacheStore>>,
        correlator: Option<Correlator>,
    ) -> Self {
        Self {
            registry,
            resolver,
            health,
            fallback,
            cache,
            correlator,
        }
    }

    /// Execute a non-streaming completion
    pub async fn complete(
        &self,
        request: CompletionRequest,
        context: &RequestContext,
    ) -> Result<CompletionOutcome, GatewayError> {
        let prepared = self.prepare(request).await?;

        if let Some(key) = &prepared.cache_key
            && let Some(mut response) = self.cache_lookup(key).await
        {
            self.record_conversation(&prepared.handle, &prepared.turns, &response).await;
            response.conversation_id = prepared.handle.as_ref().map(|h| h.conversation_id.clone());
            return Ok(CompletionOutcome {
                response,
                provider: "cache".to_owned(),
                cached: true,
            });
        }

        let (mut response, provider) = self.run_attempts(&prepared, context).await?;

        self.commit_cache(prepared.cache_key.as_ref(), &provider, &response).await;
        self.record_conversation(&prepared.handle, &prepared.turns, &response).await;
        response.conversation_id = prepared.handle.as_ref().map(|h| h.conversation_id.clone());

        Ok(CompletionOutcome {
            response,
            provider,
            cached: false,
        })
    }

    /// Execute a streaming completion
    ///
    /// Chunks flush to the returned stream as produced while an
    /// accumulator builds the full response server-side; cache and
    /// conversation state commit only once the accumulated response is
    /// structurally complete and validated. Dropping the stream cancels
    /// the upstream call and commits nothing.
    pub async fn complete_stream(
        self: &Arc<Self>,
        request: CompletionRequest,
        context: &RequestContext,
    ) -> Result<StreamOutcome, GatewayError> {
        let prepared = self.prepare(request).await?;

        if let Some(key) = &prepared.cache_key
            && let Some(response) = self.cache_lookup(key).await
        {
            self.record_conversation(&prepared.handle, &prepared.turns, &response).await;
            let model = response.model.clone();
            let events = replay_events(&response);
            return Ok(StreamOutcome {
                provider: "cache".to_owned(),
                model,
                stream: futures_util::stream::iter(events).boxed(),
            });
        }

        let (stream, state) = self.open_stream(&prepared, context).await?;

        let (tx, rx) = futures::channel::mpsc::channel(32);
        let this = Arc::clone(self);
        let provider = state.provider.clone();
        let model = state.model.clone();

        tokio::spawn(async move {
            this.pump_stream(stream, tx, state).await;
        });

        Ok(StreamOutcome {
            provider,
            model,
            stream: rx.boxed(),
        })
    }

    /// All advertised models, for `GET /v1/models`
    pub fn list_models(&self) -> Vec<String> {
        self.resolver.list_models()
    }

    /// Render templates, resolve the conversation, and compute cache keys
    async fn prepare(&self, mut request: CompletionRequest) -> Result<PreparedRequest, GatewayError> {
        let variables = request.input.take();
        let raw_messages = match &variables {
            Some(vars) if template::has_placeholders(&request.messages) => {
                let raw = request.messages.clone();
                template::render_messages(&mut request.messages, vars)?;
                Some(raw)
            }
            _ => None,
        };

        let turns: Vec<TranscriptTurn> = request
            .messages
            .iter()
            .map(|m| TranscriptTurn::new(m.role.as_str(), m.content.canonical()))
            .collect();

        let handle = match &self.correlator {
            Some(correlator) => Some(
                correlator
                    .resolve(request.explicit_conversation_id(), &turns)
                    .await,
            ),
            None => None,
        };

        let cache_key = (self.cache.is_some()
            && is_cacheable(request.cache, request.params.temperature, request.has_tools()))
        .then(|| compute_cache_key(&request, raw_messages.as_deref(), variables.as_ref()));

        Ok(PreparedRequest {
            request,
            turns,
            handle,
            cache_key,
        })
    }

    /// Look up the cache, degrading store failures to a miss
    async fn cache_lookup(&self, key: &CacheKey) -> Option<CompletionResponse> {
        let store = self.cache.as_ref()?;

        match store.get(key).await {
            Ok(Some(entry)) => match serde_json::from_str(&entry.body) {
                Ok(response) => Some(response),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                let error = GatewayError::CacheStoreUnavailable(e.to_string());
                tracing::warn!(error = %error, "degrading to cache miss");
                None
            }
        }
    }

    /// Run fallback-ordered attempts for a non-streaming completion
    async fn run_attempts(
        &self,
        prepared: &PreparedRequest,
        context: &RequestContext,
    ) -> Result<(CompletionResponse, String), GatewayError> {
        let mut current = self.resolver.resolve(&prepared.request.model)?;
        let mut plan = self.fallback.plan(prepared.request.fallback.clone());

        loop {
            let provider = self
                .registry
                .get(&current.provider)
                .ok_or_else(|| GatewayError::ProviderNotFound {
                    provider: current.provider.clone(),
                })?;

            let mut attempt_request = prepared.request.clone();
            attempt_request.model.clone_from(&current.model);
            let (shaped, splan) = structured::shape_request(&attempt_request, provider.capabilities());

            plan.record_attempt(&current.provider, &current.model);
            tracing::debug!(
                attempt = plan.attempts(),
                provider = %current.provider,
                model = %current.model,
                "attempting provider"
            );

            let outcome = tokio::time::timeout(provider.timeout(), provider.complete(&shaped, context)).await;

            let failure = match outcome {
                Err(_) => {
                    self.health.record_failure(&current.provider);
                    ProviderFailure::new(ErrorKind::TransientNetwork, "provider attempt timed out")
                }
                Ok(Err(failure)) => {
                    self.health.record_failure(&current.provider);
                    failure
                }
                Ok(Ok(response)) => {
                    self.health.record_success(&current.provider);
                    match structured::check_response(&splan, &response) {
                        StructuredOutcome::Ok => {
                            return Ok((response, current.provider));
                        }
                        StructuredOutcome::Retriable(failure) => failure,
                        StructuredOutcome::Terminal(error) => return Err(error),
                    }
                }
            };

            current = match self.next_candidate(&mut plan, &failure) {
                Some(next) => next,
                None => {
                    return Err(GatewayError::Provider {
                        provider: current.provider,
                        model: current.model,
                        failure,
                    });
                }
            };
        }
    }

    /// Open an upstream stream, with fallback until first byte
    async fn open_stream(
        &self,
        prepared: &PreparedRequest,
        context: &RequestContext,
    ) -> Result<(ChunkStream, StreamCommitState), GatewayError> {
        let mut current = self.resolver.resolve(&prepared.request.model)?;
        let mut plan = self.fallback.plan(prepared.request.fallback.clone());

        loop {
            let provider = self
                .registry
                .get(&current.provider)
                .ok_or_else(|| GatewayError::ProviderNotFound {
                    provider: current.provider.clone(),
                })?;

            let mut attempt_request = prepared.request.clone();
            attempt_request.model.clone_from(&current.model);
            let (shaped, splan) = structured::shape_request(&attempt_request, provider.capabilities());

            plan.record_attempt(&current.provider, &current.model);

            let outcome =
                tokio::time::timeout(provider.timeout(), provider.complete_stream(&shaped, context)).await;

            let failure = match outcome {
                Err(_) => {
                    self.health.record_failure(&current.provider);
                    ProviderFailure::new(ErrorKind::TransientNetwork, "provider attempt timed out")
                }
                Ok(Err(failure)) => {
                    self.health.record_failure(&current.provider);
                    failure
                }
                Ok(Ok(stream)) => {
                    self.health.record_success(&current.provider);
                    let state = StreamCommitState {
                        provider: current.provider.clone(),
                        model: current.model.clone(),
                        plan: splan,
                        cache_key: prepared.cache_key.clone(),
                        turns: prepared.turns.clone(),
                        handle: prepared.handle.clone(),
                    };
                    return Ok((stream, state));
                }
            };

            current = match self.next_candidate(&mut plan, &failure) {
                Some(next) => next,
                None => {
                    return Err(GatewayError::Provider {
                        provider: current.provider,
                        model: current.model,
                        failure,
                    });
                }
            };
        }
    }

    /// Propose the next healthy, resolvable candidate
    fn next_candidate(
        &self,
        plan: &mut crate::fallback::FallbackPlan<'_>,
        failure: &ProviderFailure,
    ) -> Option<ResolvedModel> {
        while let Some(candidate) = plan.next(failure) {
            let reference = crate::types::ModelRef {
                provider: candidate.provider.clone(),
                model: candidate.model.clone(),
            };

            match self.resolver.resolve_ref(&reference) {
                Ok(resolved) => {
                    if self.health.is_available(&resolved.provider) {
                        return Some(resolved);
                    }
                    tracing::debug!(provider = %resolved.provider, "skipping unhealthy provider");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unresolvable fallback candidate");
                }
            }
        }
        None
    }

    /// Forward chunks to the caller while accumulating the full response
    ///
    /// The tee: one branch flushes each chunk out as produced, the other
    /// builds the complete response for validation and commit. A closed
    /// receiver means the caller disconnected; the upstream stream is
    /// dropped and nothing is committed.
    async fn pump_stream(
        self: Arc<Self>,
        mut stream: ChunkStream,
        mut tx: futures::channel::mpsc::Sender<Result<StreamEvent, GatewayError>>,
        state: StreamCommitState,
    ) {
        let mut accumulator = StreamAccumulator::new(state.model.clone());

        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamEvent::Done) => break,
                Ok(event) => {
                    accumulator.observe(&event);
                    if tx.send(Ok(event)).await.is_err() {
                        tracing::debug!("caller disconnected mid-stream, discarding partial response");
                        return;
                    }
                }
                Err(failure) => {
                    let error = GatewayError::Provider {
                        provider: state.provider.clone(),
                        model: state.model.clone(),
                        failure,
                    };
                    let _ = tx.send(Err(error)).await;
                    return;
                }
            }
        }

        let response = accumulator.finish();

        if !response.is_complete() {
            tracing::warn!("stream ended without a finish reason, not committing");
            let _ = tx.send(Ok(StreamEvent::Done)).await;
            return;
        }

        match structured::check_response(&state.plan, &response) {
            StructuredOutcome::Ok => {}
            // Post-hoc validation cannot retry a fully delivered stream;
            // terminate with an error event instead of the done marker
            StructuredOutcome::Retriable(failure) => {
                let error = GatewayError::Provider {
                    provider: state.provider.clone(),
                    model: state.model.clone(),
                    failure,
                };
                let _ = tx.send(Err(error)).await;
                return;
            }
            StructuredOutcome::Terminal(error) => {
                let _ = tx.send(Err(error)).await;
                return;
            }
        }

        let _ = tx.send(Ok(StreamEvent::Done)).await;

        self.commit_cache(state.cache_key.as_ref(), &state.provider, &response).await;
        self.record_conversation(&state.handle, &state.turns, &response).await;
    }

    /// Store a completed response in the cache (idempotent overwrite)
    ///
    /// The cached body never carries a conversation id; correlation is
    /// per-request and applied after retrieval.
    async fn commit_cache(&self, key: Option<&CacheKey>, provider: &str, response: &CompletionResponse) {
        let (Some(store), Some(key)) = (&self.cache, key) else {
            return;
        };

        if !response.is_complete() {
            return;
        }

        let Ok(body) = serde_json::to_string(response) else {
            return;
        };

        let entry = CachedResponse {
            body,
            model: response.model.clone(),
            provider: provider.to_owned(),
        };

        if let Err(e) = store.put(key, &entry).await {
            let error = GatewayError::CacheStoreUnavailable(e.to_string());
            tracing::warn!(error = %error, "failed to store response in cache");
        }
    }

    /// Extend the conversation chain with the completed response
    async fn record_conversation(
        &self,
        handle: &Option<ConversationHandle>,
        turns: &[TranscriptTurn],
        response: &CompletionResponse,
    ) {
        let (Some(correlator), Some(handle)) = (&self.correlator, handle) else {
            return;
        };

        let mut full_transcript = turns.to_vec();
        full_transcript.push(TranscriptTurn::new(
            "assistant",
            response.primary_content().unwrap_or_default(),
        ));

        correlator.record_response(handle, &full_transcript).await;
    }
}

/// Compute the two-part cache key for a request
///
/// The input hash covers the canonicalized message list, or the
/// unresolved template plus resolved variables when templating was used.
/// The version hash covers the generation parameters that change the
/// output, including the unresolved templates.
fn compute_cache_key(
    request: &CompletionRequest,
    raw_messages: Option<&[Message]>,
    variables: Option<&serde_json::Map<String, serde_json::Value>>,
) -> CacheKey {
    let input_material = raw_messages.map_or_else(
        || serde_json::json!({ "messages": request.messages }),
        |raw| serde_json::json!({ "template": raw, "variables": variables }),
    );

    let version_material = serde_json::json!({
        "model": request.model,
        "temperature": request.params.temperature,
        "top_p": request.params.top_p,
        "max_tokens": request.params.max_tokens,
        "templates": raw_messages,
    });

    CacheKey::new(&input_material, &version_material)
}

/// Synthesize stream events replaying a cached response
fn replay_events(response: &CompletionResponse) -> Vec<Result<StreamEvent, GatewayError>> {
    let mut events = Vec::new();

    if let Some(choice) = response.choices.first() {
        if let Some(reasoning) = &choice.message.reasoning_content {
            events.push(Ok(StreamEvent::Delta(StreamDelta {
                index: 0,
                reasoning_content: Some(reasoning.clone()),
                ..StreamDelta::default()
            })));
        }
        events.push(Ok(StreamEvent::Delta(StreamDelta {
            index: 0,
            content: choice.message.content.clone(),
            finish_reason: choice.finish_reason,
            ..StreamDelta::default()
        })));
    }

    if let Some(usage) = &response.usage {
        events.push(Ok(StreamEvent::Usage(usage.clone())));
    }

    events.push(Ok(StreamEvent::Done));
    events
}

/// Server-side accumulator for the streaming tee
///
/// Concatenating the `content` deltas delivered to the caller yields
/// exactly the `content` of the finished response used for caching.
struct StreamAccumulator {
    model: String,
    content: String,
    reasoning: String,
    tool_calls: Vec<AccumulatedToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

#[derive(Default)]
struct AccumulatedToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamAccumulator {
    fn new(model: String) -> Self {
        Self {
            model,
            content: String::new(),
            reasoning: String::new(),
            tool_calls: Vec::new(),
            finish_reason: None,
            usage: None,
        }
    }

    fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Delta(delta) => {
                if let Some(content) = &delta.content {
                    self.content.push_str(content);
                }
                if let Some(reasoning) = &delta.reasoning_content {
                    self.reasoning.push_str(reasoning);
                }
                if let Some(tc) = &delta.tool_call {
                    let index = tc.index as usize;
                    while self.tool_calls.len() <= index {
                        self.tool_calls.push(AccumulatedToolCall::default());
                    }
                    let slot = &mut self.tool_calls[index];
                    if let Some(id) = &tc.id {
                        slot.id.clone_from(id);
                    }
                    if let Some(function) = &tc.function {
                        if let Some(name) = &function.name {
                            slot.name.clone_from(name);
                        }
                        if let Some(arguments) = &function.arguments {
                            slot.arguments.push_str(arguments);
                        }
                    }
                }
                if let Some(finish_reason) = delta.finish_reason {
                    self.finish_reason = Some(finish_reason);
                }
            }
            StreamEvent::Usage(usage) => {
                self.usage = Some(usage.clone());
            }
            StreamEvent::Done => {}
        }
    }

    fn finish(self) -> CompletionResponse {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .filter(|tc| !tc.name.is_empty())
            .map(|tc| ToolCall {
                id: tc.id,
                function: FunctionCall {
                    name: tc.name,
                    arguments: tc.arguments,
                },
            })
            .collect();

        let message = ChoiceMessage {
            role: "assistant".to_owned(),
            content: if self.content.is_empty() && !tool_calls.is_empty() {
                None
            } else {
                Some(self.content)
            },
            reasoning_content: (!self.reasoning.is_empty()).then_some(self.reasoning),
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        };

        CompletionResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_owned(),
            created: now,
            model: self.model,
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: self.finish_reason,
            }],
            usage: self.usage,
            conversation_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_cache::CachePolicy;

    use crate::types::{StreamFunctionCall, StreamToolCall};

    fn content_delta(text: &str) -> StreamEvent {
        StreamEvent::Delta(StreamDelta {
            index: 0,
            content: Some(text.to_owned()),
            ..StreamDelta::default()
        })
    }

    #[test]
    fn accumulated_content_equals_concatenated_deltas() {
        let deltas = ["The ", "quick ", "brown ", "fox"];
        let mut accumulator = StreamAccumulator::new("test-model".to_owned());

        let mut forwarded = String::new();
        for text in deltas {
            let event = content_delta(text);
            accumulator.observe(&event);
            if let StreamEvent::Delta(d) = &event {
                forwarded.push_str(d.content.as_deref().unwrap_or_default());
            }
        }
        accumulator.observe(&StreamEvent::Delta(StreamDelta {
            index: 0,
            finish_reason: Some(FinishReason::Stop),
            ..StreamDelta::default()
        }));

        let response = accumulator.finish();
        assert_eq!(response.primary_content(), Some(forwarded.as_str()));
        assert!(response.is_complete());
    }

    #[test]
    fn reasoning_accumulates_separately_from_content() {
        let mut accumulator = StreamAccumulator::new("test-model".to_owned());

        accumulator.observe(&StreamEvent::Delta(StreamDelta {
            index: 0,
            reasoning_content: Some("thinking...".to_owned()),
            ..StreamDelta::default()
        }));
        accumulator.observe(&content_delta("answer"));
        accumulator.observe(&StreamEvent::Delta(StreamDelta {
            index: 0,
            finish_reason: Some(FinishReason::Stop),
            ..StreamDelta::default()
        }));

        let response = accumulator.finish();
        let message = &response.choices[0].message;
        assert_eq!(message.content.as_deref(), Some("answer"));
        assert_eq!(message.reasoning_content.as_deref(), Some("thinking..."));
    }

    #[test]
    fn tool_call_fragments_assemble() {
        let mut accumulator = StreamAccumulator::new("test-model".to_owned());

        accumulator.observe(&StreamEvent::Delta(StreamDelta {
            index: 0,
            tool_call: Some(StreamToolCall {
                index: 0,
                id: Some("call_1".to_owned()),
                function: Some(StreamFunctionCall {
                    name: Some("get_weather".to_owned()),
                    arguments: None,
                }),
            }),
            ..StreamDelta::default()
        }));
        accumulator.observe(&StreamEvent::Delta(StreamDelta {
            index: 0,
            tool_call: Some(StreamToolCall {
                index: 0,
                id: None,
                function: Some(StreamFunctionCall {
                    name: None,
                    arguments: Some(r#"{"location":"#.to_owned()),
                }),
            }),
            ..StreamDelta::default()
        }));
        accumulator.observe(&StreamEvent::Delta(StreamDelta {
            index: 0,
            tool_call: Some(StreamToolCall {
                index: 0,
                id: None,
                function: Some(StreamFunctionCall {
                    name: None,
                    arguments: Some(r#""Paris"}"#.to_owned()),
                }),
            }),
            ..StreamDelta::default()
        }));
        accumulator.observe(&StreamEvent::Delta(StreamDelta {
            index: 0,
            finish_reason: Some(FinishReason::ToolCalls),
            ..StreamDelta::default()
        }));

        let response = accumulator.finish();
        let tool_calls = response.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].function.name, "get_weather");
        assert_eq!(tool_calls[0].function.arguments, r#"{"location":"Paris"}"#);
    }

    #[test]
    fn incomplete_stream_yields_incomplete_response() {
        let mut accumulator = StreamAccumulator::new("test-model".to_owned());
        accumulator.observe(&content_delta("partial"));

        let response = accumulator.finish();
        assert!(!response.is_complete());
    }

    #[test]
    fn cache_key_separates_template_from_variables() {
        let base = CompletionRequest {
            model: "test-model".to_owned(),
            messages: vec![Message::text(crate::types::Role::User, "Summarize {{topic}}")],
            params: crate::types::CompletionParams {
                temperature: Some(0.0),
                ..crate::types::CompletionParams::default()
            },
            tools: None,
            tool_choice: None,
            response_format: crate::types::ResponseFormat::Text,
            reasoning: None,
            stream: false,
            cache: CachePolicy::Always,
            fallback: crate::types::FallbackPolicy::Auto,
            input: None,
            metadata: std::collections::HashMap::new(),
        };

        let raw = base.messages.clone();
        let vars_a: serde_json::Map<String, serde_json::Value> =
            [("topic".to_owned(), serde_json::json!("cats"))].into_iter().collect();
        let vars_b: serde_json::Map<String, serde_json::Value> =
            [("topic".to_owned(), serde_json::json!("dogs"))].into_iter().collect();

        let key_a = compute_cache_key(&base, Some(&raw), Some(&vars_a));
        let key_b = compute_cache_key(&base, Some(&raw), Some(&vars_b));

        // Different variables change the input hash, not the version hash
        assert_ne!(key_a.input_hash, key_b.input_hash);
        assert_eq!(key_a.version_hash, key_b.version_hash);
    }
}
