//! Schema rewrites applied before a schema is compiled.

use serde_json::{Map, Value};

pub use crate::payload::is_file_schema;

/// Lower-case every property name in a headers schema.
///
/// Header names are case-insensitive on the wire and hosts hand them over
/// lower-cased, so `{"properties": {"X-Trace": ...}}` must match a `x-trace`
/// key. Names listed in `required` are lower-cased to stay in step. The
/// rewrite recurses through `properties`, `items` and `additionalProperties`.
pub fn lowercase_header_properties(schema: &Value) -> Value {
    let Value::Object(object) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(object.len());
    for (keyword, value) in object {
        let rewritten = match (keyword.as_str(), value) {
            ("properties", Value::Object(properties)) => Value::Object(
                properties
                    .iter()
                    .map(|(name, sub)| (name.to_ascii_lowercase(), lowercase_header_properties(sub)))
                    .collect(),
            ),
            ("required", Value::Array(names)) => Value::Array(
                names
                    .iter()
                    .map(|name| match name {
                        Value::String(s) => Value::String(s.to_ascii_lowercase()),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            ("items", _) | ("additionalProperties", _) => lowercase_header_properties(value),
            _ => value.clone(),
        };
        out.insert(keyword.clone(), rewritten);
    }
    Value::Object(out)
}

/// Whether a response schema should never be registered: absent, or of
/// declared type `void`.
pub fn is_void_response(schema: Option<&Value>) -> bool {
    match schema {
        None | Some(Value::Null) => true,
        Some(schema) => schema.get("type").and_then(Value::as_str) == Some("void"),
    }
}
