//! Loose field coercion for JSON payloads
//!
//! Feeds are inconsistent about field types. Scalars are coerced to text,
//! compound values are treated as absent.

use serde_json::{Map, Value};

/// Coerces a scalar JSON value into a string
///
/// | Input | Output |
/// |-------|--------|
/// | `"text"` | `Some("text")` |
/// | `""` / whitespace only | `None` |
/// | `42`, `1.5` | `Some("42")`, `Some("1.5")` |
/// | `true` | `Some("true")` |
/// | `null`, object, array | `None` |
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Looks up `key` in `obj` and coerces it with [`coerce_string`]
pub fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(coerce_string)
}

/// Returns the first of `keys` that resolves to a usable string
pub fn first_string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| string_field(obj, key))
}

/// Extracts an ordered tag list from an array value
///
/// Elements that cannot be coerced are dropped; a non-array yields no tags.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(values)) => values.iter().filter_map(coerce_string).collect(),
        _ => Vec::new(),
    }
}

/// Short JSON type name used in warnings
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
