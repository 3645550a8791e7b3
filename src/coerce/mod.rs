//! # Type Coercion
//!
//! Transport data arrives as strings: path segments, query values, header
//! values and form fields are all text on the wire. Before structural
//! validation, the engine walks the value alongside its schema and narrows
//! string leaves to the primitive type the schema declares.
//!
//! ## Rules
//!
//! - `object` schemas recurse into each declared property present on the
//!   value. Undeclared properties pass through untouched.
//! - `array` schemas recurse into each element using `items`.
//! - `integer` / `number` leaves parse the trimmed string. `"0"` becomes `0`.
//!   Empty strings, `NaN` and infinities stay strings. `integer` rejects any
//!   text containing `.` and any non-integral result.
//! - `boolean` leaves map exactly `"true"` and `"false"`.
//! - With `force_array_on_scalar` (query strings only), a lone string under
//!   an `array` schema whose items are primitive becomes a one-element array.
//!
//! A value that cannot be converted is left exactly as it was, so the
//! validator reports the type mismatch instead of coercion hiding it.
//! Coercion never adds missing properties.

mod query;

pub use query::*;

use serde_json::{Map, Number, Value};

/// The `type` keyword of a schema, as far as coercion cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    /// Missing, a type array, or a type coercion does not handle.
    Other,
}

impl SchemaType {
    pub fn of(schema: &Value) -> Self {
        match schema.get("type").and_then(Value::as_str) {
            Some("object") => SchemaType::Object,
            Some("array") => SchemaType::Array,
            Some("string") => SchemaType::String,
            Some("number") => SchemaType::Number,
            Some("integer") => SchemaType::Integer,
            Some("boolean") => SchemaType::Boolean,
            _ => SchemaType::Other,
        }
    }

    fn is_scalar(self) -> bool {
        matches!(
            self,
            SchemaType::String | SchemaType::Number | SchemaType::Integer | SchemaType::Boolean
        )
    }
}

/// Coerce `value` to match `schema`, returning the converted value.
///
/// # Arguments
///
/// * `value` - Value to convert; taken by value so nested containers are
///   rewritten without cloning
/// * `schema` - JSON Schema describing the expected shape
/// * `force_array_on_scalar` - Wrap a lone string into a one-element array
///   when the schema expects an array of primitives
pub fn coerce(value: Value, schema: &Value, force_array_on_scalar: bool) -> Value {
    let schema_type = SchemaType::of(schema);
    let items = schema.get("items").filter(|items| items.is_object());

    let wrap = force_array_on_scalar
        && schema_type == SchemaType::Array
        && value.is_string()
        && items.is_some_and(|items| SchemaType::of(items).is_scalar());
    let value = if wrap { Value::Array(vec![value]) } else { value };

    match (schema_type, value) {
        (SchemaType::Object, Value::Object(mut map)) => {
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                coerce_properties(&mut map, properties, force_array_on_scalar);
            }
            Value::Object(map)
        }
        (SchemaType::Array, Value::Array(elements)) => match items {
            Some(items) => Value::Array(
                elements
                    .into_iter()
                    .map(|element| coerce(element, items, force_array_on_scalar))
                    .collect(),
            ),
            None => Value::Array(elements),
        },
        (schema_type, value) => coerce_leaf(value, schema_type),
    }
}

/// Coerce a request section (path params, query, headers) in place against
/// an object schema.
///
/// Non-object schemas leave the map untouched.
pub fn coerce_map_in_place(map: &mut Map<String, Value>, schema: &Value, force_array_on_scalar: bool) {
    if SchemaType::of(schema) != SchemaType::Object {
        return;
    }
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        coerce_properties(map, properties, force_array_on_scalar);
    }
}

fn coerce_properties(
    map: &mut Map<String, Value>,
    properties: &Map<String, Value>,
    force_array_on_scalar: bool,
) {
    for (name, property_schema) in properties {
        if let Some(slot) = map.get_mut(name) {
            let current = std::mem::take(slot);
            *slot = coerce(current, property_schema, force_array_on_scalar);
        }
    }
}

fn coerce_leaf(value: Value, schema_type: SchemaType) -> Value {
    let text = match value {
        Value::String(text) => text,
        other => return other,
    };
    let converted = match schema_type {
        SchemaType::Integer => parse_integer(&text),
        SchemaType::Number => parse_number(&text),
        SchemaType::Boolean => parse_boolean(&text),
        _ => None,
    };
    converted.unwrap_or(Value::String(text))
}

fn parse_boolean(text: &str) -> Option<Value> {
    match text {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn parse_integer(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.contains('.') {
        return None;
    }
    if let Some(exact) = parse_exact(trimmed) {
        return Some(exact);
    }
    // Exponent forms such as "1e3" are integral once parsed.
    let f = parse_finite(trimmed)?;
    if f.fract() != 0.0 {
        return None;
    }
    number_value(f)
}

fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Some(exact) = parse_exact(trimmed) {
        return Some(exact);
    }
    number_value(parse_finite(trimmed)?)
}

/// Integer text that fits `i64` or `u64` keeps its exact value.
fn parse_exact(trimmed: &str) -> Option<Value> {
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    trimmed.parse::<u64>().ok().map(Value::from)
}

fn parse_finite(trimmed: &str) -> Option<f64> {
    if trimmed.is_empty() {
        return None;
    }
    // Rust accepts "inf", "nan" and friends; only plain numeric text counts.
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn number_value(f: f64) -> Option<Value> {
    // `i64::MAX as f64` rounds up to 2^63, which `as i64` would saturate.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Some(Value::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========================================================================
    // Leaf conversion
    // ========================================================================

    #[test]
    fn test_integer_from_string() {
        assert_eq!(coerce(json!("42"), &json!({"type": "integer"}), false), json!(42));
        assert_eq!(coerce(json!(" -7 "), &json!({"type": "integer"}), false), json!(-7));
        assert_eq!(coerce(json!("1e3"), &json!({"type": "integer"}), false), json!(1000));
    }

    #[test]
    fn test_integer_past_i64_keeps_value() {
        let schema = json!({"type": "integer"});
        assert_eq!(coerce(json!("9223372036854775807"), &schema, false), json!(i64::MAX));
        assert_eq!(
            coerce(json!("9223372036854775808"), &schema, false),
            json!(9_223_372_036_854_775_808u64)
        );
        assert_eq!(coerce(json!("18446744073709551615"), &schema, false), json!(u64::MAX));
        assert_eq!(
            coerce(json!("9223372036854775808"), &json!({"type": "number"}), false),
            json!(9_223_372_036_854_775_808u64)
        );
    }

    #[test]
    fn test_exponent_at_i64_bound_is_not_clamped() {
        let coerced = coerce(json!("1e19"), &json!({"type": "integer"}), false);
        assert_ne!(coerced, json!(i64::MAX));
        assert_eq!(coerced.as_f64(), Some(1e19));
    }

    #[test]
    fn test_integer_rejects_decimal_point() {
        assert_eq!(coerce(json!("42.5"), &json!({"type": "integer"}), false), json!("42.5"));
        assert_eq!(coerce(json!("42.0"), &json!({"type": "integer"}), false), json!("42.0"));
    }

    #[test]
    fn test_zero_coerces() {
        assert_eq!(coerce(json!("0"), &json!({"type": "integer"}), false), json!(0));
        assert_eq!(coerce(json!("0"), &json!({"type": "number"}), false), json!(0));
        assert_eq!(coerce(json!("0.0"), &json!({"type": "number"}), false), json!(0));
    }

    #[test]
    fn test_number_from_string() {
        assert_eq!(coerce(json!("3.25"), &json!({"type": "number"}), false), json!(3.25));
        assert_eq!(coerce(json!("12"), &json!({"type": "number"}), false), json!(12));
    }

    #[test]
    fn test_unparseable_numbers_stay_strings() {
        for text in ["", "  ", "abc", "NaN", "inf", "Infinity", "1,000", "0x10"] {
            assert_eq!(
                coerce(json!(text), &json!({"type": "number"}), false),
                json!(text),
                "{text:?} should not coerce"
            );
        }
    }

    #[test]
    fn test_boolean_exact_match_only() {
        let schema = json!({"type": "boolean"});
        assert_eq!(coerce(json!("true"), &schema, false), json!(true));
        assert_eq!(coerce(json!("false"), &schema, false), json!(false));
        assert_eq!(coerce(json!("truefalse"), &schema, false), json!("truefalse"));
        assert_eq!(coerce(json!("TRUE"), &schema, false), json!("TRUE"));
        assert_eq!(coerce(json!("1"), &schema, false), json!("1"));
    }

    #[test]
    fn test_non_string_leaves_untouched() {
        assert_eq!(coerce(json!(5), &json!({"type": "string"}), false), json!(5));
        assert_eq!(coerce(json!(true), &json!({"type": "integer"}), false), json!(true));
        assert_eq!(coerce(json!("5"), &json!({"type": "string"}), false), json!("5"));
    }

    #[test]
    fn test_type_array_is_not_coerced() {
        let schema = json!({"type": ["integer", "null"]});
        assert_eq!(coerce(json!("5"), &schema, false), json!("5"));
    }

    // ========================================================================
    // Containers
    // ========================================================================

    #[test]
    fn test_object_recurses_into_declared_properties() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer"},
                "nested": {
                    "type": "object",
                    "properties": { "flag": {"type": "boolean"} }
                }
            }
        });
        let out = coerce(
            json!({"count": "3", "nested": {"flag": "true"}, "extra": "7"}),
            &schema,
            false,
        );
        assert_eq!(out, json!({"count": 3, "nested": {"flag": true}, "extra": "7"}));
    }

    #[test]
    fn test_missing_properties_are_not_fabricated() {
        let schema = json!({
            "type": "object",
            "properties": { "count": {"type": "integer"} },
            "required": ["count"]
        });
        assert_eq!(coerce(json!({}), &schema, false), json!({}));
    }

    #[test]
    fn test_array_elements_coerced() {
        let schema = json!({"type": "array", "items": {"type": "number"}});
        assert_eq!(coerce(json!(["1", "2.5", "x"]), &schema, false), json!([1, 2.5, "x"]));
    }

    #[test]
    fn test_force_array_wraps_scalar() {
        let schema = json!({"type": "array", "items": {"type": "string"}});
        assert_eq!(coerce(json!("a"), &schema, true), json!(["a"]));
        assert_eq!(coerce(json!("a"), &schema, false), json!("a"));
    }

    #[test]
    fn test_force_array_then_coerces_element() {
        let schema = json!({"type": "array", "items": {"type": "integer"}});
        assert_eq!(coerce(json!("9"), &schema, true), json!([9]));
    }

    #[test]
    fn test_force_array_skips_object_items() {
        let schema = json!({"type": "array", "items": {"type": "object"}});
        assert_eq!(coerce(json!("a"), &schema, true), json!("a"));
    }

    #[test]
    fn test_coerce_map_in_place() {
        let schema = json!({
            "type": "object",
            "properties": { "id": {"type": "integer"}, "tags": {"type": "array", "items": {"type": "string"}} }
        });
        let mut map = json!({"id": "12", "tags": "one"}).as_object().cloned().unwrap();
        coerce_map_in_place(&mut map, &schema, true);
        assert_eq!(Value::Object(map), json!({"id": 12, "tags": ["one"]}));
    }
}
