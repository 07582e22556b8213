//! Structured-output strategy selection and enforcement
//!
//! Strategy by descending provider capability: native `json_schema`
//! (with the schema run through preparation first), then schemaless JSON
//! mode with post-hoc validation, then free text with the schema
//! embedded as prompt instructions and best-effort validation. Output is
//! validated against the caller's original, un-rewritten schema and is
//! never repaired.

use conduit_schema::{ValidationError, ValidationErrorKind, ValidationFailure};
use serde_json::Value;

use crate::error::{ErrorKind, GatewayError, ProviderFailure};
use crate::provider::ProviderCapabilities;
use crate::types::{CompletionRequest, CompletionResponse, Message, ResponseFormat, Role};

/// How structured output is obtained from the current provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredMode {
    /// No structural requirement
    FreeText,
    /// Provider enforces the (prepared) schema natively
    NativeSchema,
    /// Provider guarantees JSON syntax; schema checked post-hoc
    JsonMode,
    /// Schema embedded in prompt instructions; best-effort validation
    PromptInjection,
}

/// Per-attempt structured-output plan
#[derive(Debug, Clone)]
pub struct StructuredPlan {
    /// Selected mode for this provider
    pub mode: StructuredMode,
    /// The caller's original schema, used for validation
    pub original_schema: Option<Value>,
}

/// Outcome of checking produced output against the plan
pub enum StructuredOutcome {
    /// Output conforms (or nothing was required)
    Ok,
    /// Native schema enforcement produced non-conforming output; the
    /// fallback engine may try a different provider
    Retriable(ProviderFailure),
    /// Terminal validation failure for this request
    Terminal(GatewayError),
}

/// Shape a request for the given provider's capabilities
///
/// Returns the provider-ready request and the plan used to validate the
/// output afterwards.
pub fn shape_request(request: &CompletionRequest, caps: ProviderCapabilities) -> (CompletionRequest, StructuredPlan) {
    let mut shaped = request.clone();

    match &request.response_format {
        ResponseFormat::Text => (
            shaped,
            StructuredPlan {
                mode: StructuredMode::FreeText,
                original_schema: None,
            },
        ),
        ResponseFormat::JsonObject => {
            if caps.json_mode {
                (
                    shaped,
                    StructuredPlan {
                        mode: StructuredMode::JsonMode,
                        original_schema: None,
                    },
                )
            } else {
                shaped.response_format = ResponseFormat::Text;
                append_instruction(&mut shaped, "Respond with a single valid JSON object and nothing else.");
                (
                    shaped,
                    StructuredPlan {
                        mode: StructuredMode::PromptInjection,
                        original_schema: None,
                    },
                )
            }
        }
        ResponseFormat::JsonSchema { json_schema } => {
            let original_schema = Some(json_schema.schema.clone());

            if caps.structured_output {
                let mut spec = json_schema.clone();
                spec.schema = conduit_schema::prepare(&spec.schema);
                shaped.response_format = ResponseFormat::JsonSchema { json_schema: spec };
                (
                    shaped,
                    StructuredPlan {
                        mode: StructuredMode::NativeSchema,
                        original_schema,
                    },
                )
            } else if caps.json_mode {
                shaped.response_format = ResponseFormat::JsonObject;
                append_instruction(&mut shaped, &schema_instruction(&json_schema.schema));
                (
                    shaped,
                    StructuredPlan {
                        mode: StructuredMode::JsonMode,
                        original_schema,
                    },
                )
            } else {
                shaped.response_format = ResponseFormat::Text;
                append_instruction(&mut shaped, &schema_instruction(&json_schema.schema));
                (
                    shaped,
                    StructuredPlan {
                        mode: StructuredMode::PromptInjection,
                        original_schema,
                    },
                )
            }
        }
    }
}

/// Check a completed response against the plan
pub fn check_response(plan: &StructuredPlan, response: &CompletionResponse) -> StructuredOutcome {
    if plan.mode == StructuredMode::FreeText {
        return StructuredOutcome::Ok;
    }

    // Tool-call responses carry no content to validate
    let Some(content) = response.primary_content() else {
        return StructuredOutcome::Ok;
    };

    let Some(parsed) = parse_json_output(content) else {
        let failure = syntax_failure(content);
        return match plan.mode {
            StructuredMode::NativeSchema => StructuredOutcome::Retriable(ProviderFailure::new(
                ErrorKind::StructuredGenerationUnsupported,
                format!("provider-native structured output is not valid JSON: {failure}"),
            )),
            _ => StructuredOutcome::Terminal(GatewayError::Validation(failure)),
        };
    };

    let Some(schema) = &plan.original_schema else {
        return StructuredOutcome::Ok;
    };

    match conduit_schema::validate(schema, &parsed) {
        Ok(()) => StructuredOutcome::Ok,
        Err(failure) => match plan.mode {
            // The provider claimed native enforcement and still missed;
            // another provider may do better
            StructuredMode::NativeSchema => StructuredOutcome::Retriable(ProviderFailure::new(
                ErrorKind::StructuredGenerationUnsupported,
                format!("provider-native structured output failed validation: {failure}"),
            )),
            _ => StructuredOutcome::Terminal(GatewayError::Validation(failure)),
        },
    }
}

/// Parse model output as JSON, tolerating a fenced code block
fn parse_json_output(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))?;

    serde_json::from_str(unfenced.trim()).ok()
}

fn syntax_failure(content: &str) -> ValidationFailure {
    let preview: String = content.chars().take(80).collect();
    ValidationFailure {
        errors: vec![ValidationError {
            kind: ValidationErrorKind::TypeMismatch,
            path: String::new(),
            message: format!("output is not valid JSON: {preview}"),
        }],
        total: 1,
    }
}

/// Append a system instruction carrying the output contract
fn append_instruction(request: &mut CompletionRequest, instruction: &str) {
    request
        .messages
        .push(Message::text(Role::System, instruction.to_owned()));
}

fn schema_instruction(schema: &Value) -> String {
    format!(
        "Respond with a single JSON object conforming to this JSON Schema, with no surrounding text:\n{}",
        serde_json::to_string_pretty(schema).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Choice, ChoiceMessage, JsonSchemaSpec};

    const fn caps(structured_output: bool, json_mode: bool) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calls: true,
            structured_output,
            json_mode,
            max_context_tokens: None,
            max_output_tokens: None,
        }
    }

    fn schema_request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".to_owned(),
            messages: vec![Message::text(Role::User, "extract the person")],
            params: crate::types::CompletionParams::default(),
            tools: None,
            tool_choice: None,
            response_format: ResponseFormat::JsonSchema {
                json_schema: JsonSchemaSpec {
                    name: "person".to_owned(),
                    schema: serde_json::json!({
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "age": {"type": "integer", "minimum": 0}
                        },
                        "required": ["name", "age"]
                    }),
                    strict: Some(true),
                },
            },
            reasoning: None,
            stream: false,
            cache: conduit_cache::CachePolicy::Auto,
            fallback: crate::types::FallbackPolicy::Auto,
            input: None,
            metadata: std::collections::HashMap::new(),
        }
    }

    fn response_with(content: &str) -> CompletionResponse {
        CompletionResponse {
            id: "r1".to_owned(),
            object: "chat.completion".to_owned(),
            created: 0,
            model: "test-model".to_owned(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage::text(content.to_owned()),
                finish_reason: Some(crate::types::FinishReason::Stop),
            }],
            usage: None,
            conversation_id: None,
        }
    }

    #[test]
    fn native_mode_prepares_schema() {
        let (shaped, plan) = shape_request(&schema_request(), caps(true, true));

        assert_eq!(plan.mode, StructuredMode::NativeSchema);
        let spec = shaped.response_format.schema_spec().unwrap();
        // Preparation closes objects; the original stays open in the plan
        assert_eq!(spec.schema["additionalProperties"], serde_json::json!(false));
        assert!(plan.original_schema.unwrap().get("additionalProperties").is_none());
    }

    #[test]
    fn json_mode_embeds_schema_instruction() {
        let (shaped, plan) = shape_request(&schema_request(), caps(false, true));

        assert_eq!(plan.mode, StructuredMode::JsonMode);
        assert_eq!(shaped.response_format, ResponseFormat::JsonObject);
        let last = shaped.messages.last().unwrap();
        assert!(last.content.as_text().contains("JSON Schema"));
    }

    #[test]
    fn prompt_injection_when_no_json_support() {
        let (shaped, plan) = shape_request(&schema_request(), caps(false, false));

        assert_eq!(plan.mode, StructuredMode::PromptInjection);
        assert_eq!(shaped.response_format, ResponseFormat::Text);
    }

    #[test]
    fn native_validation_failure_is_retriable() {
        let (_, plan) = shape_request(&schema_request(), caps(true, true));
        let response = response_with(r#"{"age": -5}"#);

        match check_response(&plan, &response) {
            StructuredOutcome::Retriable(failure) => {
                assert_eq!(failure.kind, ErrorKind::StructuredGenerationUnsupported);
            }
            _ => panic!("expected retriable failure"),
        }
    }

    #[test]
    fn json_mode_validation_failure_is_terminal() {
        let (_, plan) = shape_request(&schema_request(), caps(false, true));
        let response = response_with(r#"{"age": -5}"#);

        match check_response(&plan, &response) {
            StructuredOutcome::Terminal(GatewayError::Validation(failure)) => {
                assert_eq!(failure.total, 2);
            }
            _ => panic!("expected terminal validation failure"),
        }
    }

    #[test]
    fn conforming_output_passes_with_fences() {
        let (_, plan) = shape_request(&schema_request(), caps(false, false));
        let response = response_with("```json\n{\"name\": \"Ada\", \"age\": 36}\n```");

        assert!(matches!(check_response(&plan, &response), StructuredOutcome::Ok));
    }
}
