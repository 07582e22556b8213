//! Conversion between canonical types and `OpenAI` wire format

use conduit_cache::CachePolicy;

use crate::error::GatewayError;
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall,
    OpenAiImageUrl, OpenAiJsonSchema, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiResponseFormat,
    OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamToolCall,
    OpenAiTool, OpenAiToolCall, OpenAiUsage, OpenAiUseFallback,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionParams, CompletionRequest, CompletionResponse, Content, ContentPart,
    FallbackPolicy, FinishReason, FunctionCall, JsonSchemaSpec, Message, ModelRef, ReasoningEffort, ReasoningSpec,
    ResponseFormat, Role, StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall, ToolCall, ToolChoice,
    ToolChoiceFunction, ToolChoiceMode, ToolDefinition, Usage,
};

// -- Inbound: OpenAI wire format -> canonical types --

impl TryFrom<OpenAiRequest> for CompletionRequest {
    type Error = GatewayError;

    fn try_from(req: OpenAiRequest) -> Result<Self, Self::Error> {
        let fallback = match req.use_fallback {
            None => FallbackPolicy::default(),
            Some(OpenAiUseFallback::Mode(mode)) => match mode.as_str() {
                "auto" => FallbackPolicy::Auto,
                "never" => FallbackPolicy::Never,
                other => {
                    return Err(GatewayError::InvalidRequest(format!(
                        "use_fallback must be \"auto\", \"never\", or a model list, got \"{other}\""
                    )));
                }
            },
            Some(OpenAiUseFallback::Models(models)) => {
                if models.is_empty() {
                    return Err(GatewayError::InvalidRequest(
                        "use_fallback model list must not be empty".to_owned(),
                    ));
                }
                FallbackPolicy::Explicit(models.iter().map(|m| ModelRef::parse(m)).collect())
            }
        };

        let reasoning = req
            .reasoning
            .map(|r| {
                let effort = r
                    .effort
                    .as_deref()
                    .map(|e| match e {
                        "low" => Ok(ReasoningEffort::Low),
                        "medium" => Ok(ReasoningEffort::Medium),
                        "high" => Ok(ReasoningEffort::High),
                        other => Err(GatewayError::InvalidRequest(format!(
                            "reasoning.effort must be \"low\", \"medium\", or \"high\", got \"{other}\""
                        ))),
                    })
                    .transpose()?;

                Ok::<_, GatewayError>(ReasoningSpec {
                    effort,
                    budget: r.budget,
                })
            })
            .transpose()?;

        Ok(Self {
            model: req.model,
            messages: req.messages.into_iter().map(Into::into).collect(),
            params: CompletionParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_tokens,
                stop: req.stop,
                frequency_penalty: req.frequency_penalty,
                presence_penalty: req.presence_penalty,
                seed: req.seed,
            },
            tools: req.tools.map(|tools| tools.into_iter().map(Into::into).collect()),
            tool_choice: req.tool_choice.and_then(|v| parse_openai_tool_choice(&v)),
            response_format: req.response_format.map(Into::into).unwrap_or_default(),
            reasoning,
            stream: req.stream.unwrap_or(false),
            cache: req.use_cache.unwrap_or(CachePolicy::Auto),
            fallback,
            input: req.input,
            metadata: req.metadata.unwrap_or_default(),
        })
    }
}

impl From<OpenAiResponseFormat> for ResponseFormat {
    fn from(format: OpenAiResponseFormat) -> Self {
        match format {
            OpenAiResponseFormat::Text => Self::Text,
            OpenAiResponseFormat::JsonObject => Self::JsonObject,
            OpenAiResponseFormat::JsonSchema { json_schema } => Self::JsonSchema {
                json_schema: JsonSchemaSpec {
                    name: json_schema.name,
                    schema: json_schema.schema,
                    strict: json_schema.strict,
                },
            },
        }
    }
}

impl From<OpenAiMessage> for Message {
    fn from(msg: OpenAiMessage) -> Self {
        let role = match msg.role.as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::User,
        };

        let content = match msg.content {
            Some(OpenAiContent::Text(text)) => Content::Text(text),
            Some(OpenAiContent::Parts(parts)) => Content::Parts(parts.into_iter().map(Into::into).collect()),
            None => Content::Text(String::new()),
        };

        let tool_calls = msg.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    function: FunctionCall {
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    },
                })
                .collect()
        });

        Self {
            role,
            content,
            name: msg.name,
            tool_calls,
            tool_call_id: msg.tool_call_id,
        }
    }
}

impl From<OpenAiContentPart> for ContentPart {
    fn from(part: OpenAiContentPart) -> Self {
        match part {
            OpenAiContentPart::Text { text } => Self::Text { text },
            OpenAiContentPart::ImageUrl { image_url } => Self::Image {
                url: image_url.url,
                detail: image_url.detail,
            },
        }
    }
}

impl From<OpenAiTool> for ToolDefinition {
    fn from(tool: OpenAiTool) -> Self {
        Self {
            tool_type: tool.tool_type,
            function: crate::types::FunctionDefinition {
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
            },
        }
    }
}

/// Parse `OpenAI`'s flexible `tool_choice` field into our canonical type
fn parse_openai_tool_choice(value: &serde_json::Value) -> Option<ToolChoice> {
    match value {
        serde_json::Value::String(s) => match s.as_str() {
            "none" => Some(ToolChoice::Mode(ToolChoiceMode::None)),
            "auto" => Some(ToolChoice::Mode(ToolChoiceMode::Auto)),
            "required" => Some(ToolChoice::Mode(ToolChoiceMode::Required)),
            _ => None,
        },
        serde_json::Value::Object(_) => serde_json::from_value::<ToolChoiceFunction>(value.clone())
            .ok()
            .map(ToolChoice::Function),
        _ => None,
    }
}

// -- Outbound: canonical request -> OpenAI wire request --

impl From<&CompletionRequest> for OpenAiRequest {
    fn from(req: &CompletionRequest) -> Self {
        let response_format = match &req.response_format {
            ResponseFormat::Text => None,
            ResponseFormat::JsonObject => Some(OpenAiResponseFormat::JsonObject),
            ResponseFormat::JsonSchema { json_schema } => Some(OpenAiResponseFormat::JsonSchema {
                json_schema: OpenAiJsonSchema {
                    name: json_schema.name.clone(),
                    schema: json_schema.schema.clone(),
                    strict: json_schema.strict,
                },
            }),
        };

        let reasoning_effort = req.reasoning.as_ref().and_then(|r| {
            r.effort.map(|e| {
                match e {
                    ReasoningEffort::Low => "low",
                    ReasoningEffort::Medium => "medium",
                    ReasoningEffort::High => "high",
                }
                .to_owned()
            })
        });

        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_tokens: req.params.max_tokens,
            stop: req.params.stop.clone(),
            frequency_penalty: req.params.frequency_penalty,
            presence_penalty: req.params.presence_penalty,
            seed: req.params.seed,
            stream: if req.stream { Some(true) } else { None },
            response_format,
            reasoning_effort,
            tools: req.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: t.tool_type.clone(),
                        function: OpenAiFunction {
                            name: t.function.name.clone(),
                            description: t.function.description.clone(),
                            parameters: t.function.parameters.clone(),
                        },
                    })
                    .collect()
            }),
            tool_choice: req.tool_choice.as_ref().map(tool_choice_to_openai_value),
            stream_options: None,
            input: None,
            metadata: None,
            use_cache: None,
            use_fallback: None,
            reasoning: None,
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let content = match &msg.content {
            Content::Text(text) => Some(OpenAiContent::Text(text.clone())),
            Content::Parts(parts) => Some(OpenAiContent::Parts(parts.iter().map(Into::into).collect())),
        };

        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    tool_type: "function".to_owned(),
                    function: OpenAiFunctionCall {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect()
        });

        Self {
            role: msg.role.as_str().to_owned(),
            content,
            name: msg.name.clone(),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

impl From<&ContentPart> for OpenAiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text: text.clone() },
            ContentPart::Image { url, detail } => Self::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: url.clone(),
                    detail: detail.clone(),
                },
            },
        }
    }
}

/// Convert canonical tool choice to `OpenAI` JSON value
fn tool_choice_to_openai_value(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Mode(mode) => {
            let s = match mode {
                ToolChoiceMode::None => "none",
                ToolChoiceMode::Auto => "auto",
                ToolChoiceMode::Required => "required",
            };
            serde_json::Value::String(s.to_owned())
        }
        ToolChoice::Function(func) => {
            serde_json::json!({
                "type": func.tool_type,
                "function": {
                    "name": func.function.name
                }
            })
        }
    }
}

// -- Outbound: canonical response -> OpenAI wire response --

impl From<CompletionResponse> for OpenAiResponse {
    fn from(resp: CompletionResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp.choices.into_iter().map(Into::into).collect(),
            usage: resp.usage.map(Into::into),
            conversation_id: resp.conversation_id,
        }
    }
}

impl From<Choice> for OpenAiChoice {
    fn from(choice: Choice) -> Self {
        Self {
            index: choice.index,
            message: OpenAiChoiceMessage {
                role: choice.message.role,
                content: choice.message.content,
                reasoning_content: choice.message.reasoning_content,
                tool_calls: choice.message.tool_calls.map(|calls| {
                    calls
                        .into_iter()
                        .map(|tc| OpenAiToolCall {
                            id: tc.id,
                            tool_type: "function".to_owned(),
                            function: OpenAiFunctionCall {
                                name: tc.function.name,
                                arguments: tc.function.arguments,
                            },
                        })
                        .collect()
                }),
            },
            finish_reason: choice.finish_reason.map(|fr| finish_reason_str(fr).to_owned()),
        }
    }
}

impl From<Usage> for OpenAiUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

// -- Inbound: OpenAI wire response -> canonical response --

impl From<OpenAiResponse> for CompletionResponse {
    fn from(resp: OpenAiResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| {
                    let finish_reason = c.finish_reason.as_deref().and_then(parse_finish_reason);

                    let tool_calls = c.message.tool_calls.map(|calls| {
                        calls
                            .into_iter()
                            .map(|tc| ToolCall {
                                id: tc.id,
                                function: FunctionCall {
                                    name: tc.function.name,
                                    arguments: tc.function.arguments,
                                },
                            })
                            .collect()
                    });

                    Choice {
                        index: c.index,
                        message: ChoiceMessage {
                            role: c.message.role,
                            content: c.message.content,
                            reasoning_content: c.message.reasoning_content,
                            tool_calls,
                        },
                        finish_reason,
                    }
                })
                .collect(),
            usage: resp.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                reasoning_tokens: None,
                total_tokens: u.total_tokens,
            }),
            conversation_id: None,
        }
    }
}

// -- Stream conversion --

/// Convert an `OpenAI` stream chunk into canonical stream events
///
/// A chunk carrying both `reasoning_content` and `content` is split into
/// two deltas; the two kinds are never concatenated.
pub fn openai_chunk_to_events(chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in &chunk.choices {
        if let Some(reasoning) = &choice.delta.reasoning_content {
            events.push(StreamEvent::Delta(StreamDelta {
                index: choice.index,
                reasoning_content: Some(reasoning.clone()),
                ..StreamDelta::default()
            }));
        }

        let finish_reason = choice.finish_reason.as_deref().and_then(parse_finish_reason);

        let tool_call = choice
            .delta
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
            .map(|tc| StreamToolCall {
                index: tc.index,
                id: tc.id.clone(),
                function: tc.function.as_ref().map(|f| StreamFunctionCall {
                    name: f.name.clone(),
                    arguments: f.arguments.clone(),
                }),
            });

        if choice.delta.content.is_some() || tool_call.is_some() || finish_reason.is_some() {
            events.push(StreamEvent::Delta(StreamDelta {
                index: choice.index,
                content: choice.delta.content.clone(),
                reasoning_content: None,
                tool_call,
                finish_reason,
            }));
        }
    }

    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            reasoning_tokens: None,
            total_tokens: usage.total_tokens,
        }));
    }

    events
}

/// Convert a canonical stream delta to an `OpenAI` stream chunk
pub fn delta_to_openai_chunk(delta: &StreamDelta, id: &str, model: &str, created: u64) -> OpenAiStreamChunk {
    let tool_calls = delta.tool_call.as_ref().map(|tc| {
        vec![OpenAiStreamToolCall {
            index: tc.index,
            id: tc.id.clone(),
            tool_type: tc.id.as_ref().map(|_| "function".to_owned()),
            function: tc.function.as_ref().map(|f| OpenAiStreamFunctionCall {
                name: f.name.clone(),
                arguments: f.arguments.clone(),
            }),
        }]
    });

    OpenAiStreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![OpenAiStreamChoice {
            index: delta.index,
            delta: OpenAiStreamDelta {
                role: None,
                content: delta.content.clone(),
                reasoning_content: delta.reasoning_content.clone(),
                tool_calls,
            },
            finish_reason: delta.finish_reason.map(|fr| finish_reason_str(fr).to_owned()),
        }],
        usage: None,
    }
}

/// Convert a canonical `Usage` to an `OpenAI` stream chunk with usage data
pub fn usage_to_openai_chunk(usage: &Usage, id: &str, model: &str, created: u64) -> OpenAiStreamChunk {
    OpenAiStreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![],
        usage: Some(OpenAiUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }),
    }
}

/// Parse a finish reason string
pub(crate) fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" | "end_turn" => Some(FinishReason::Stop),
        "length" | "max_tokens" => Some(FinishReason::Length),
        "tool_calls" | "tool_use" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

/// Wire name for a finish reason
pub(crate) const fn finish_reason_str(fr: FinishReason) -> &'static str {
    match fr {
        FinishReason::Stop => "stop",
        FinishReason::Length => "length",
        FinishReason::ToolCalls => "tool_calls",
        FinishReason::ContentFilter => "content_filter",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_with_reasoning_and_content_splits_into_two_deltas() {
        let chunk = OpenAiStreamChunk {
            id: "c1".to_owned(),
            object: "chat.completion.chunk".to_owned(),
            created: 0,
            model: "test".to_owned(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta: OpenAiStreamDelta {
                    role: None,
                    content: Some("answer".to_owned()),
                    reasoning_content: Some("thinking".to_owned()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
            usage: None,
        };

        let events = openai_chunk_to_events(&chunk);
        assert_eq!(events.len(), 2);

        let StreamEvent::Delta(first) = &events[0] else {
            panic!("expected delta");
        };
        assert_eq!(first.reasoning_content.as_deref(), Some("thinking"));
        assert!(first.content.is_none());

        let StreamEvent::Delta(second) = &events[1] else {
            panic!("expected delta");
        };
        assert_eq!(second.content.as_deref(), Some("answer"));
        assert!(second.reasoning_content.is_none());
    }

    #[test]
    fn use_fallback_mode_rejects_unknown_strings() {
        let request = OpenAiRequest {
            model: "gpt-4o".to_owned(),
            messages: vec![],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            stream: None,
            response_format: None,
            reasoning_effort: None,
            tools: None,
            tool_choice: None,
            stream_options: None,
            input: None,
            metadata: None,
            use_cache: None,
            use_fallback: Some(OpenAiUseFallback::Mode("sometimes".to_owned())),
            reasoning: None,
        };

        let result = CompletionRequest::try_from(request);
        assert!(result.is_err());
    }

    #[test]
    fn explicit_fallback_list_parsed_into_model_refs() {
        let request = OpenAiRequest {
            model: "gpt-4o".to_owned(),
            messages: vec![],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            stream: None,
            response_format: None,
            reasoning_effort: None,
            tools: None,
            tool_choice: None,
            stream_options: None,
            input: None,
            metadata: None,
            use_cache: None,
            use_fallback: Some(OpenAiUseFallback::Models(vec![
                "anthropic/claude-sonnet-4-20250514".to_owned(),
                "gpt-4o-mini".to_owned(),
            ])),
            reasoning: None,
        };

        let internal = CompletionRequest::try_from(request).unwrap();
        let FallbackPolicy::Explicit(refs) = internal.fallback else {
            panic!("expected explicit policy");
        };
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].provider.as_deref(), Some("anthropic"));
        assert!(refs[1].provider.is_none());
    }
}
