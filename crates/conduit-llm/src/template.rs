//! Message templating for the `input` extension
//!
//! Replaces `{{ variable }}` placeholders in message text with values
//! from the request's `input` map. The unresolved messages stay part of
//! the cache version hash so the same template with different variables
//! caches separately.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::{Content, ContentPart, Message};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_]+)\s*\}\}").expect("must be valid regex"))
}

/// Whether any message text carries a `{{var}}` placeholder
pub fn has_placeholders(messages: &[Message]) -> bool {
    messages.iter().any(|msg| match &msg.content {
        Content::Text(text) => placeholder_re().is_match(text),
        Content::Parts(parts) => parts.iter().any(|p| match p {
            ContentPart::Text { text } => placeholder_re().is_match(text),
            ContentPart::Image { .. } => false,
        }),
    })
}

/// Substitute template variables into every text segment
///
/// # Errors
///
/// Returns `invalid_request` when a placeholder names a variable absent
/// from the `input` map.
pub fn render_messages(
    messages: &mut [Message],
    variables: &serde_json::Map<String, Value>,
) -> Result<(), GatewayError> {
    for msg in messages.iter_mut() {
        match &mut msg.content {
            Content::Text(text) => {
                *text = render_text(text, variables)?;
            }
            Content::Parts(parts) => {
                for part in parts.iter_mut() {
                    if let ContentPart::Text { text } = part {
                        *text = render_text(text, variables)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn render_text(text: &str, variables: &serde_json::Map<String, Value>) -> Result<String, GatewayError> {
    let mut missing: Option<String> = None;

    let rendered = placeholder_re().replace_all(text, |captures: &regex::Captures<'_>| {
        let name = captures.get(1).map_or("", |m| m.as_str());
        variables.get(name).map_or_else(
            || {
                missing = Some(name.to_owned());
                String::new()
            },
            value_as_text,
        )
    });

    match missing {
        Some(name) => Err(GatewayError::InvalidRequest(format!(
            "template variable \"{name}\" is not present in input"
        ))),
        None => Ok(rendered.into_owned()),
    }
}

/// Render a variable value into message text
fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn vars(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn renders_string_and_number_variables() {
        let mut messages = vec![Message::text(Role::User, "Summarize {{ title }} in {{count}} words")];
        let variables = vars(&[
            ("title", Value::String("the report".to_owned())),
            ("count", serde_json::json!(50)),
        ]);

        render_messages(&mut messages, &variables).unwrap();
        assert_eq!(messages[0].content.as_text(), "Summarize the report in 50 words");
    }

    #[test]
    fn missing_variable_is_invalid_request() {
        let mut messages = vec![Message::text(Role::User, "Hello {{ name }}")];
        let err = render_messages(&mut messages, &vars(&[])).unwrap_err();

        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn placeholder_detection() {
        let templated = vec![Message::text(Role::User, "Hi {{ name }}")];
        assert!(has_placeholders(&templated));

        let plain = vec![Message::text(Role::User, "Hi there")];
        assert!(!has_placeholders(&plain));
    }
}
