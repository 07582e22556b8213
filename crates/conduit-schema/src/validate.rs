//! Post-hoc validation of model output against a caller schema

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum violations surfaced per failure; the rest are counted
pub const MAX_SURFACED_ERRORS: usize = 5;

/// Category of a single schema violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// A required property is absent
    MissingRequired,
    /// The value has the wrong JSON type
    TypeMismatch,
    /// The value is not one of the allowed enum members
    EnumViolation,
    /// A numeric or length bound was violated
    ConstraintViolation,
    /// An object carries a property the schema does not allow
    AdditionalProperties,
}

/// One schema violation with its location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Violation category
    pub kind: ValidationErrorKind,
    /// Dotted path to the offending value (e.g. `user.age`, `items[2].name`)
    pub path: String,
    /// Human-readable description naming the violated rule
    pub message: String,
}

/// Validation outcome carrying every violation (capped) plus a total
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("output does not conform to schema: {total} violation(s)")]
pub struct ValidationFailure {
    /// Surfaced violations, at most [`MAX_SURFACED_ERRORS`]
    pub errors: Vec<ValidationError>,
    /// Total violations found, including those not surfaced
    pub total: usize,
}

/// Validate a value against a JSON Schema
///
/// Covers the subset of draft constructs model providers emit schemas
/// with: `type`, `properties`, `required`, `enum`, numeric bounds,
/// string/array length bounds, `items`, `additionalProperties: false`,
/// and `$ref` into root-level `$defs`/`definitions`.
///
/// # Errors
///
/// Returns every violation as a [`ValidationFailure`]; the output is
/// never repaired.
pub fn validate(schema: &Value, value: &Value) -> Result<(), ValidationFailure> {
    let mut walker = Walker {
        root: schema,
        errors: Vec::new(),
        total: 0,
    };
    walker.check(schema, value, "");

    if walker.total == 0 {
        Ok(())
    } else {
        Err(ValidationFailure {
            errors: walker.errors,
            total: walker.total,
        })
    }
}

struct Walker<'a> {
    root: &'a Value,
    errors: Vec<ValidationError>,
    total: usize,
}

impl<'a> Walker<'a> {
    fn record(&mut self, kind: ValidationErrorKind, path: &str, message: String) {
        self.total += 1;
        if self.errors.len() < MAX_SURFACED_ERRORS {
            self.errors.push(ValidationError {
                kind,
                path: path.to_owned(),
                message,
            });
        }
    }

    fn check(&mut self, schema: &'a Value, value: &Value, path: &str) {
        let schema = self.resolve_ref(schema, 0);

        if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                let listed = allowed.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
                self.record(
                    ValidationErrorKind::EnumViolation,
                    path,
                    format!("value {value} is not one of the allowed values [{listed}]"),
                );
            }
            return;
        }

        if let Some(expected) = schema.get("type").and_then(Value::as_str) {
            if !type_matches(expected, value) {
                self.record(
                    ValidationErrorKind::TypeMismatch,
                    path,
                    format!("expected {expected}, got {} ({value})", type_name(value)),
                );
                return;
            }
        }

        match value {
            Value::Object(fields) => self.check_object(schema, fields, path),
            Value::Array(items) => self.check_array(schema, items, path),
            Value::Number(_) => self.check_number(schema, value, path),
            Value::String(s) => self.check_string(schema, s, path),
            _ => {}
        }
    }

    fn check_object(&mut self, schema: &'a Value, fields: &serde_json::Map<String, Value>, path: &str) {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    let field_path = join(path, name);
                    self.record(
                        ValidationErrorKind::MissingRequired,
                        &field_path,
                        format!("required property \"{name}\" is missing"),
                    );
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);

        if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
            for key in fields.keys() {
                if properties.is_none_or(|props| !props.contains_key(key)) {
                    let field_path = join(path, key);
                    self.record(
                        ValidationErrorKind::AdditionalProperties,
                        &field_path,
                        format!("property \"{key}\" is not allowed"),
                    );
                }
            }
        }

        if let Some(props) = properties {
            for (key, prop_schema) in props {
                if let Some(field_value) = fields.get(key) {
                    let field_path = join(path, key);
                    self.check(prop_schema, field_value, &field_path);
                }
            }
        }
    }

    fn check_array(&mut self, schema: &'a Value, items: &[Value], path: &str) {
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("array has {} item(s), minimum is {min}", items.len()),
                );
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if items.len() as u64 > max {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("array has {} item(s), maximum is {max}", items.len()),
                );
            }
        }

        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                self.check(item_schema, item, &item_path);
            }
        }
    }

    fn check_number(&mut self, schema: &Value, value: &Value, path: &str) {
        let Some(actual) = value.as_f64() else {
            return;
        };

        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if actual < min {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("value {value} violates minimum {min}"),
                );
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if actual > max {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("value {value} violates maximum {max}"),
                );
            }
        }
        if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
            if actual <= min {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("value {value} violates exclusive minimum {min}"),
                );
            }
        }
        if let Some(max) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
            if actual >= max {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("value {value} violates exclusive maximum {max}"),
                );
            }
        }
    }

    fn check_string(&mut self, schema: &Value, s: &str, path: &str) {
        let length = s.chars().count() as u64;

        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if length < min {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("string length {length} violates minLength {min}"),
                );
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if length > max {
                self.record(
                    ValidationErrorKind::ConstraintViolation,
                    path,
                    format!("string length {length} violates maxLength {max}"),
                );
            }
        }
    }

    /// Resolve `$ref` pointers into root-level `$defs`/`definitions`
    fn resolve_ref(&self, schema: &'a Value, depth: u8) -> &'a Value {
        if depth > 8 {
            return schema;
        }

        let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
            return schema;
        };

        let name = reference
            .strip_prefix("#/$defs/")
            .or_else(|| reference.strip_prefix("#/definitions/"));

        let resolved = name.and_then(|n| {
            self.root
                .get("$defs")
                .or_else(|| self.root.get("definitions"))
                .and_then(|defs| defs.get(n))
        });

        resolved.map_or(schema, |r| self.resolve_ref(r, depth + 1))
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}
