//! Conversion between canonical types and Google Generative Language wire format

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::google::{
    GoogleCandidate, GoogleContent, GoogleFunctionCall, GoogleFunctionCallingConfig, GoogleFunctionDeclaration,
    GoogleFunctionResponse, GoogleGenerationConfig, GoogleInlineData, GooglePart, GoogleRequest, GoogleResponse,
    GoogleThinkingConfig, GoogleTool, GoogleToolConfig,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Content, ContentPart, FinishReason, FunctionCall,
    Message, ReasoningEffort, ResponseFormat, Role, StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall,
    ToolCall, ToolChoice, ToolChoiceMode, Usage,
};

// -- Outbound: canonical request -> Google wire request --

impl From<&CompletionRequest> for GoogleRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => {
                    system_instruction = Some(GoogleContent {
                        role: None,
                        parts: vec![GooglePart::text(msg.content.as_text())],
                    });
                }
                Role::User => {
                    contents.push(canonical_message_to_google(msg, "user"));
                }
                Role::Assistant => {
                    contents.push(canonical_message_to_google(msg, "model"));
                }
                Role::Tool => {
                    if let Some(tool_call_id) = &msg.tool_call_id {
                        let response_value = serde_json::from_str(&msg.content.as_text())
                            .unwrap_or_else(|_| serde_json::json!({"result": msg.content.as_text()}));
                        contents.push(GoogleContent {
                            role: Some("function".to_owned()),
                            parts: vec![GooglePart {
                                function_response: Some(GoogleFunctionResponse {
                                    name: tool_call_id.clone(),
                                    response: response_value,
                                }),
                                ..GooglePart::default()
                            }],
                        });
                    }
                }
            }
        }

        // Gemini takes the schema natively via generation config
        let (response_mime_type, response_schema) = match &req.response_format {
            ResponseFormat::Text => (None, None),
            ResponseFormat::JsonObject => (Some("application/json".to_owned()), None),
            ResponseFormat::JsonSchema { json_schema } => {
                (Some("application/json".to_owned()), Some(json_schema.schema.clone()))
            }
        };

        let thinking_config = req.reasoning.as_ref().map(|spec| GoogleThinkingConfig {
            thinking_budget: spec.budget.unwrap_or_else(|| match spec.effort {
                Some(ReasoningEffort::High) => 16384,
                Some(ReasoningEffort::Medium) | None => 4096,
                Some(ReasoningEffort::Low) => 1024,
            }),
            include_thoughts: Some(true),
        });

        let generation_config = Some(GoogleGenerationConfig {
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_output_tokens: req.params.max_tokens,
            stop_sequences: req.params.stop.clone(),
            response_mime_type,
            response_schema,
            thinking_config,
        });

        let tools = req.tools.as_ref().map(|tools| {
            vec![GoogleTool {
                function_declarations: tools
                    .iter()
                    .map(|t| GoogleFunctionDeclaration {
                        name: t.function.name.clone(),
                        description: t.function.description.clone(),
                        parameters: t.function.parameters.clone(),
                    })
                    .collect(),
            }]
        });

        let tool_config = req.tool_choice.as_ref().map(|tc| {
            let (mode, allowed_names) = match tc {
                ToolChoice::Mode(ToolChoiceMode::None) => ("NONE".to_owned(), None),
                ToolChoice::Mode(ToolChoiceMode::Auto) => ("AUTO".to_owned(), None),
                ToolChoice::Mode(ToolChoiceMode::Required) => ("ANY".to_owned(), None),
                ToolChoice::Function(func) => ("ANY".to_owned(), Some(vec![func.function.name.clone()])),
            };
            GoogleToolConfig {
                function_calling_config: GoogleFunctionCallingConfig {
                    mode,
                    allowed_function_names: allowed_names,
                },
            }
        });

        Self {
            contents,
            system_instruction,
            generation_config,
            tools,
            tool_config,
        }
    }
}

/// Convert a canonical message to a Google content object
fn canonical_message_to_google(msg: &Message, role: &str) -> GoogleContent {
    let mut parts = Vec::new();

    match &msg.content {
        Content::Text(text) => {
            if !text.is_empty() {
                parts.push(GooglePart::text(text.clone()));
            }
        }
        Content::Parts(content_parts) => {
            for part in content_parts {
                match part {
                    ContentPart::Text { text } => {
                        parts.push(GooglePart::text(text.clone()));
                    }
                    ContentPart::Image { url, .. } => {
                        // Inline data requires a data URI; plain URLs are skipped
                        if let Some(rest) = url.strip_prefix("data:")
                            && let Some((mime_and_encoding, data)) = rest.split_once(',')
                        {
                            let mime_type = mime_and_encoding.strip_suffix(";base64").unwrap_or(mime_and_encoding);
                            parts.push(GooglePart {
                                inline_data: Some(GoogleInlineData {
                                    mime_type: mime_type.to_owned(),
                                    data: data.to_owned(),
                                }),
                                ..GooglePart::default()
                            });
                        }
                    }
                }
            }
        }
    }

    if let Some(tool_calls) = &msg.tool_calls {
        for tc in tool_calls {
            let args = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            parts.push(GooglePart {
                function_call: Some(GoogleFunctionCall {
                    name: tc.function.name.clone(),
                    args,
                }),
                ..GooglePart::default()
            });
        }
    }

    if parts.is_empty() {
        parts.push(GooglePart::text(String::new()));
    }

    GoogleContent {
        role: Some(role.to_owned()),
        parts,
    }
}

// -- Inbound: Google wire response -> canonical types --

impl From<GoogleResponse> for CompletionResponse {
    fn from(resp: GoogleResponse) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        #[allow(clippy::cast_possible_truncation)]
        let choices = resp
            .candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| google_candidate_to_choice(&candidate, i as u32))
            .collect();

        let usage = resp.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            reasoning_tokens: u.thoughts_token_count,
            total_tokens: u.total_token_count,
        });

        Self {
            id: format!("google-{now}"),
            object: "chat.completion".to_owned(),
            created: now,
            model: String::new(), // Filled in by the provider
            choices,
            usage,
            conversation_id: None,
        }
    }
}

/// Convert a Google candidate to a canonical choice
fn google_candidate_to_choice(candidate: &GoogleCandidate, default_index: u32) -> Choice {
    let index = candidate.index.unwrap_or(default_index);

    let mut text_content = String::new();
    let mut reasoning_content = String::new();
    let mut tool_calls = Vec::new();

    for part in candidate.content.iter().flat_map(|c| &c.parts) {
        if let Some(text) = &part.text {
            // `thought` parts are deliberation, tracked separately
            if part.thought == Some(true) {
                reasoning_content.push_str(text);
            } else {
                text_content.push_str(text);
            }
        }
        if let Some(fc) = &part.function_call {
            let arguments = serde_json::to_string(&fc.args).unwrap_or_else(|_| "{}".to_owned());
            tool_calls.push(ToolCall {
                id: format!("call_{}", fc.name),
                function: FunctionCall {
                    name: fc.name.clone(),
                    arguments,
                },
            });
        }
    }

    let finish_reason = candidate.finish_reason.as_deref().and_then(parse_google_finish_reason);

    let message = ChoiceMessage {
        role: "assistant".to_owned(),
        content: if text_content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(text_content)
        },
        reasoning_content: (!reasoning_content.is_empty()).then_some(reasoning_content),
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
    };

    Choice {
        index,
        message,
        finish_reason,
    }
}

// -- Stream conversion --

/// Convert a Google streaming chunk to canonical stream events
///
/// Thought parts and answer parts in the same chunk are emitted as
/// distinct deltas, never concatenated.
pub fn google_chunk_to_events(chunk: &GoogleResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for (i, candidate) in chunk.candidates.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let index = candidate.index.unwrap_or(i as u32);

        for part in candidate.content.iter().flat_map(|c| &c.parts) {
            if let Some(text) = &part.text {
                if part.thought == Some(true) {
                    events.push(StreamEvent::Delta(StreamDelta {
                        index,
                        reasoning_content: Some(text.clone()),
                        ..StreamDelta::default()
                    }));
                } else {
                    events.push(StreamEvent::Delta(StreamDelta {
                        index,
                        content: Some(text.clone()),
                        ..StreamDelta::default()
                    }));
                }
            }
            if let Some(fc) = &part.function_call {
                let arguments = serde_json::to_string(&fc.args).unwrap_or_else(|_| "{}".to_owned());
                events.push(StreamEvent::Delta(StreamDelta {
                    index,
                    tool_call: Some(StreamToolCall {
                        index: 0,
                        id: Some(format!("call_{}", fc.name)),
                        function: Some(StreamFunctionCall {
                            name: Some(fc.name.clone()),
                            arguments: Some(arguments),
                        }),
                    }),
                    ..StreamDelta::default()
                }));
            }
        }

        let finish_reason = candidate.finish_reason.as_deref().and_then(parse_google_finish_reason);

        if finish_reason.is_some() {
            events.push(StreamEvent::Delta(StreamDelta {
                index,
                finish_reason,
                ..StreamDelta::default()
            }));
        }
    }

    if let Some(usage) = &chunk.usage_metadata {
        events.push(StreamEvent::Usage(Usage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            reasoning_tokens: usage.thoughts_token_count,
            total_tokens: usage.total_token_count,
        }));
    }

    events
}

/// Parse a Google finish reason string
fn parse_google_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "STOP" => Some(FinishReason::Stop),
        "MAX_TOKENS" => Some(FinishReason::Length),
        "SAFETY" | "PROHIBITED_CONTENT" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::google::GoogleUsageMetadata;

    #[test]
    fn thought_parts_split_from_answer_parts() {
        let chunk = GoogleResponse {
            candidates: vec![GoogleCandidate {
                content: Some(GoogleContent {
                    role: Some("model".to_owned()),
                    parts: vec![
                        GooglePart {
                            text: Some("pondering".to_owned()),
                            thought: Some(true),
                            ..GooglePart::default()
                        },
                        GooglePart::text("the answer"),
                    ],
                }),
                finish_reason: None,
                index: Some(0),
            }],
            usage_metadata: None,
        };

        let events = google_chunk_to_events(&chunk);
        assert_eq!(events.len(), 2);

        let StreamEvent::Delta(first) = &events[0] else {
            panic!("expected delta");
        };
        assert_eq!(first.reasoning_content.as_deref(), Some("pondering"));
        assert!(first.content.is_none());

        let StreamEvent::Delta(second) = &events[1] else {
            panic!("expected delta");
        };
        assert_eq!(second.content.as_deref(), Some("the answer"));
    }

    #[test]
    fn usage_carries_reasoning_tokens() {
        let chunk = GoogleResponse {
            candidates: vec![],
            usage_metadata: Some(GoogleUsageMetadata {
                prompt_token_count: 10,
                candidates_token_count: 20,
                thoughts_token_count: Some(7),
                total_token_count: 37,
            }),
        };

        let events = google_chunk_to_events(&chunk);
        let StreamEvent::Usage(usage) = &events[0] else {
            panic!("expected usage");
        };
        assert_eq!(usage.reasoning_tokens, Some(7));
    }
}
