//! Schema preparation for providers with partial JSON-Schema support
//!
//! Providers that accept a schema natively often reject constructs the
//! full draft allows. Preparation rewrites those constructs into shapes
//! every structured-output implementation handles, demoting what cannot
//! be expressed into the field description so the model still sees the
//! constraint. The original schema is untouched; validation always runs
//! against it, not the prepared copy.

use serde_json::{Map, Value};

/// Maximum `$ref` resolution depth before giving up on a cycle
const MAX_REF_DEPTH: u8 = 8;

/// Rewrite a schema for providers with partial JSON-Schema support
///
/// Applied rewrites:
/// - `$ref` pointers into root-level `$defs`/`definitions` are inlined
///   and the then-orphaned definition tables dropped
/// - a root-level `oneOf` is collapsed into a single object schema whose
///   description names the variants
/// - unsupported `format` annotations move into the field description
/// - every object forces `additionalProperties: false`
/// - every object promotes all of its properties to `required`
///
/// Preparation is idempotent: running it on an already-prepared schema
/// is a fixed point.
pub fn prepare(schema: &Value) -> Value {
    let mut prepared = schema.clone();

    let defs = collect_defs(&prepared);
    if let Some(root) = prepared.as_object_mut() {
        root.remove("$defs");
        root.remove("definitions");
    }

    inline_refs(&mut prepared, &defs, 0);
    collapse_root_one_of(&mut prepared);
    rewrite_node(&mut prepared);

    prepared
}

/// Snapshot the root-level definition tables before they are dropped
fn collect_defs(schema: &Value) -> Map<String, Value> {
    let mut defs = Map::new();
    for table in ["$defs", "definitions"] {
        if let Some(entries) = schema.get(table).and_then(Value::as_object) {
            for (name, def) in entries {
                defs.insert(name.clone(), def.clone());
            }
        }
    }
    defs
}

/// Replace `$ref` nodes with the referenced definition, recursively
fn inline_refs(node: &mut Value, defs: &Map<String, Value>, depth: u8) {
    if depth > MAX_REF_DEPTH {
        return;
    }

    if let Some(reference) = node.get("$ref").and_then(Value::as_str).map(ToOwned::to_owned) {
        let name = reference
            .strip_prefix("#/$defs/")
            .or_else(|| reference.strip_prefix("#/definitions/"));

        if let Some(definition) = name.and_then(|n| defs.get(n)) {
            *node = definition.clone();
            inline_refs(node, defs, depth + 1);
            return;
        }
        // Unresolvable ref: drop the pointer, leaving a permissive node
        if let Some(obj) = node.as_object_mut() {
            obj.remove("$ref");
        }
    }

    match node {
        Value::Object(obj) => {
            for child in obj.values_mut() {
                inline_refs(child, defs, depth + 1);
            }
        }
        Value::Array(items) => {
            for child in items {
                inline_refs(child, defs, depth + 1);
            }
        }
        _ => {}
    }
}

/// Collapse a root-level `oneOf` into one object schema
///
/// Variant properties are merged and the variant shapes are named in the
/// description, since partial implementations reject top-level unions.
fn collapse_root_one_of(root: &mut Value) {
    let Some(obj) = root.as_object_mut() else {
        return;
    };
    let Some(Value::Array(variants)) = obj.remove("oneOf") else {
        return;
    };

    let mut properties = Map::new();
    for variant in &variants {
        if let Some(props) = variant.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                properties.entry(name.clone()).or_insert_with(|| prop.clone());
            }
        }
    }

    let note = format!(
        "The value must match exactly one of {} variant shapes; all variant properties are listed here.",
        variants.len()
    );
    append_description(obj, &note);

    obj.insert("type".to_owned(), Value::String("object".to_owned()));
    obj.insert("properties".to_owned(), Value::Object(properties));
}

/// Apply per-node rewrites over the whole tree
fn rewrite_node(node: &mut Value) {
    let Some(obj) = node.as_object_mut() else {
        if let Some(items) = node.as_array_mut() {
            for child in items {
                rewrite_node(child);
            }
        }
        return;
    };

    // Move an unsupported `format` into the description
    if let Some(Value::String(format)) = obj.remove("format") {
        let note = format!("(format: {format})");
        append_description(obj, &note);
    }

    let is_object_schema = obj.get("type").and_then(Value::as_str) == Some("object");
    if is_object_schema {
        obj.insert("additionalProperties".to_owned(), Value::Bool(false));

        let property_names: Option<Vec<Value>> = obj
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().map(Value::String).collect());
        if let Some(required) = property_names {
            obj.insert("required".to_owned(), Value::Array(required));
        }
    }

    for child in obj.values_mut() {
        rewrite_node(child);
    }
}

/// Append a note to a node's description unless it is already present
fn append_description(obj: &mut Map<String, Value>, note: &str) {
    let existing = obj.get("description").and_then(Value::as_str).unwrap_or_default();
    if existing.contains(note) {
        return;
    }

    let combined = if existing.is_empty() {
        note.to_owned()
    } else {
        format!("{existing} {note}")
    };
    obj.insert("description".to_owned(), Value::String(combined));
}
