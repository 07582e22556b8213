//! Conversion between canonical types and Anthropic wire format

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta,
    AnthropicStreamEvent, AnthropicThinking, AnthropicTool, AnthropicToolChoice,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Content, ContentPart, FunctionCall, Message,
    ReasoningEffort, Role, StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall, ToolCall, ToolChoice,
    ToolChoiceMode, Usage,
};

/// Default max tokens when not specified (Anthropic requires this field)
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: canonical request -> Anthropic wire format --

impl From<&CompletionRequest> for AnthropicRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system = None;
        let mut messages = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => {
                    system = Some(msg.content.as_text());
                }
                _ => {
                    messages.push(canonical_message_to_anthropic(msg));
                }
            }
        }

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t
                        .function
                        .parameters
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                })
                .collect()
        });

        let tool_choice = req.tool_choice.as_ref().map(canonical_tool_choice_to_anthropic);

        let thinking = req.reasoning.as_ref().map(|spec| AnthropicThinking {
            thinking_type: "enabled".to_owned(),
            budget_tokens: spec.budget.unwrap_or_else(|| match spec.effort {
                Some(ReasoningEffort::High) => 16384,
                Some(ReasoningEffort::Medium) | None => 4096,
                Some(ReasoningEffort::Low) => 1024,
            }),
        });

        Self {
            model: req.model.clone(),
            max_tokens: req.params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            stop_sequences: req.params.stop.clone(),
            stream: if req.stream { Some(true) } else { None },
            thinking,
            tools,
            tool_choice,
        }
    }
}

/// Convert a canonical message to Anthropic wire format
fn canonical_message_to_anthropic(msg: &Message) -> AnthropicMessage {
    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::Tool | Role::User | Role::System => "user",
    };

    // Tool result messages become tool_result blocks
    if msg.role == Role::Tool
        && let Some(tool_call_id) = &msg.tool_call_id
    {
        return AnthropicMessage {
            role: "user".to_owned(),
            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: Some(msg.content.as_text()),
                is_error: None,
            }]),
        };
    }

    // Assistant messages with tool calls become tool_use blocks
    if let Some(tool_calls) = &msg.tool_calls {
        let mut blocks: Vec<AnthropicContentBlock> = Vec::new();

        let text = msg.content.as_text();
        if !text.is_empty() {
            blocks.push(AnthropicContentBlock::Text { text });
        }

        for tc in tool_calls {
            let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            blocks.push(AnthropicContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                input,
            });
        }

        return AnthropicMessage {
            role: role.to_owned(),
            content: AnthropicContent::Blocks(blocks),
        };
    }

    let content = match &msg.content {
        Content::Text(text) => AnthropicContent::Text(text.clone()),
        Content::Parts(parts) => {
            let blocks = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
                    ContentPart::Image { url, .. } => AnthropicContentBlock::Image {
                        source: image_url_to_source(url),
                    },
                })
                .collect();
            AnthropicContent::Blocks(blocks)
        }
    };

    AnthropicMessage {
        role: role.to_owned(),
        content,
    }
}

/// Split a data URI or pass a plain URL through as an image source
fn image_url_to_source(url: &str) -> AnthropicImageSource {
    if let Some(rest) = url.strip_prefix("data:")
        && let Some((mime_and_encoding, data)) = rest.split_once(',')
    {
        let media_type = mime_and_encoding.strip_suffix(";base64").unwrap_or(mime_and_encoding);
        AnthropicImageSource {
            source_type: "base64".to_owned(),
            media_type: Some(media_type.to_owned()),
            data: data.to_owned(),
        }
    } else {
        AnthropicImageSource {
            source_type: "url".to_owned(),
            media_type: None,
            data: url.to_owned(),
        }
    }
}

/// Convert canonical tool choice to Anthropic wire format
fn canonical_tool_choice_to_anthropic(choice: &ToolChoice) -> AnthropicToolChoice {
    match choice {
        ToolChoice::Mode(mode) => match mode {
            // Anthropic has no "none" mode; map both None and Auto to "auto"
            ToolChoiceMode::None | ToolChoiceMode::Auto => AnthropicToolChoice {
                choice_type: "auto".to_owned(),
                name: None,
            },
            ToolChoiceMode::Required => AnthropicToolChoice {
                choice_type: "any".to_owned(),
                name: None,
            },
        },
        ToolChoice::Function(func) => AnthropicToolChoice {
            choice_type: "tool".to_owned(),
            name: Some(func.function.name.clone()),
        },
    }
}

// -- Inbound: Anthropic wire response -> canonical response --

impl From<AnthropicResponse> for CompletionResponse {
    fn from(resp: AnthropicResponse) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut text_content = String::new();
        let mut reasoning_content = String::new();
        let mut tool_calls = Vec::new();

        for block in &resp.content {
            match block {
                AnthropicResponseBlock::Text { text } => {
                    text_content.push_str(text);
                }
                AnthropicResponseBlock::Thinking { thinking, .. } => {
                    reasoning_content.push_str(thinking);
                }
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    let arguments = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_owned());
                    tool_calls.push(ToolCall {
                        id: id.clone(),
                        function: FunctionCall {
                            name: name.clone(),
                            arguments,
                        },
                    });
                }
            }
        }

        let finish_reason = resp
            .stop_reason
            .as_deref()
            .and_then(crate::convert::openai::parse_finish_reason);

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

        Self {
            id: resp.id,
            object: "chat.completion".to_owned(),
            created: now,
            model: resp.model,
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason,
            }],
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                reasoning_tokens: None,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
            conversation_id: None,
        }
    }
}

// -- Stream conversion --

/// State tracker for converting Anthropic stream events
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    /// Sequential 0-based index of the tool call currently being streamed
    ///
    /// Anthropic's content block index is shared across all block types
    /// (text, thinking, tool_use), so it cannot be used as the tool-call
    /// index without creating phantom entries in consumers.
    current_tool_call_index: u32,
    /// Counter used to assign the next tool call its sequential index
    next_tool_call_index: u32,
}

impl AnthropicStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert an Anthropic stream event to canonical stream events
    pub fn convert_event(&mut self, event: &AnthropicStreamEvent) -> Vec<StreamEvent> {
        match event {
            AnthropicStreamEvent::MessageStart { .. } | AnthropicStreamEvent::Ping => Vec::new(),

            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                AnthropicStreamContentBlock::Text { .. } | AnthropicStreamContentBlock::Thinking { .. } => {
                    Vec::new()
                }
                AnthropicStreamContentBlock::ToolUse { id, name, .. } => {
                    self.current_tool_call_index = self.next_tool_call_index;
                    self.next_tool_call_index += 1;
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        tool_call: Some(StreamToolCall {
                            index: self.current_tool_call_index,
                            id: Some(id.clone()),
                            function: Some(StreamFunctionCall {
                                name: Some(name.clone()),
                                arguments: None,
                            }),
                        }),
                        ..StreamDelta::default()
                    })]
                }
            },

            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        content: Some(text.clone()),
                        ..StreamDelta::default()
                    })]
                }
                AnthropicStreamDelta::ThinkingDelta { thinking } => {
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        reasoning_content: Some(thinking.clone()),
                        ..StreamDelta::default()
                    })]
                }
                AnthropicStreamDelta::SignatureDelta { .. } => Vec::new(),
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        tool_call: Some(StreamToolCall {
                            index: self.current_tool_call_index,
                            id: None,
                            function: Some(StreamFunctionCall {
                                name: None,
                                arguments: Some(partial_json.clone()),
                            }),
                        }),
                        ..StreamDelta::default()
                    })]
                }
            },

            AnthropicStreamEvent::ContentBlockStop { .. } => Vec::new(),

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();

                let finish_reason = delta
                    .stop_reason
                    .as_deref()
                    .and_then(crate::convert::openai::parse_finish_reason);

                if finish_reason.is_some() {
                    events.push(StreamEvent::Delta(StreamDelta {
                        index: 0,
                        finish_reason,
                        ..StreamDelta::default()
                    }));
                }

                if let Some(usage) = usage {
                    events.push(StreamEvent::Usage(Usage {
                        prompt_tokens: usage.input_tokens,
                        completion_tokens: usage.output_tokens,
                        reasoning_tokens: None,
                        total_tokens: usage.input_tokens + usage.output_tokens,
                    }));
                }

                events
            }

            AnthropicStreamEvent::MessageStop => {
                vec![StreamEvent::Done]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinking_deltas_become_reasoning_content() {
        let mut state = AnthropicStreamState::new();

        state.convert_event(&AnthropicStreamEvent::ContentBlockStart {
            index: 0,
            content_block: AnthropicStreamContentBlock::Thinking {
                thinking: String::new(),
            },
        });

        let events = state.convert_event(&AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicStreamDelta::ThinkingDelta {
                thinking: "let me think".to_owned(),
            },
        });

        let StreamEvent::Delta(delta) = &events[0] else {
            panic!("expected delta");
        };
        assert_eq!(delta.reasoning_content.as_deref(), Some("let me think"));
        assert!(delta.content.is_none());
    }

    #[test]
    fn tool_calls_get_sequential_indices() {
        let mut state = AnthropicStreamState::new();

        // Text block at index 0, tool_use at content block index 1:
        // the tool call must still be index 0 in the tool_calls array
        state.convert_event(&AnthropicStreamEvent::ContentBlockStart {
            index: 0,
            content_block: AnthropicStreamContentBlock::Text { text: String::new() },
        });

        let events = state.convert_event(&AnthropicStreamEvent::ContentBlockStart {
            index: 1,
            content_block: AnthropicStreamContentBlock::ToolUse {
                id: "toolu_1".to_owned(),
                name: "get_weather".to_owned(),
                input: serde_json::json!({}),
            },
        });

        let StreamEvent::Delta(delta) = &events[0] else {
            panic!("expected delta");
        };
        assert_eq!(delta.tool_call.as_ref().unwrap().index, 0);
    }

    #[test]
    fn thinking_blocks_separate_in_full_response() {
        let resp = AnthropicResponse {
            id: "msg_1".to_owned(),
            response_type: "message".to_owned(),
            role: "assistant".to_owned(),
            content: vec![
                AnthropicResponseBlock::Thinking {
                    thinking: "deliberating".to_owned(),
                    signature: None,
                },
                AnthropicResponseBlock::Text {
                    text: "the answer".to_owned(),
                },
            ],
            model: "claude-sonnet-4-20250514".to_owned(),
            stop_reason: Some("end_turn".to_owned()),
            stop_sequence: None,
            usage: crate::protocol::anthropic::AnthropicUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
        };

        let internal: CompletionResponse = resp.into();
        let message = &internal.choices[0].message;
        assert_eq!(message.content.as_deref(), Some("the answer"));
        assert_eq!(message.reasoning_content.as_deref(), Some("deliberating"));
    }
}
