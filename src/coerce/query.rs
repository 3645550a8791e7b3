//! Query-string helpers: flat key parsing and bracket-index array rebuilding.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Default cap on `name[<index>]` indices accepted by
/// [`normalize_query_arrays`].
pub const DEFAULT_MAX_QUERY_ARRAY_INDEX: usize = 1000;

static ARRAY_INDEX_KEY: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(.*)\[(\d+)\]$").expect("valid array index regex")
});

/// Parse a raw query string (`a=1&b=two`) into a flat map of string values.
///
/// A leading `?` is ignored. When a key repeats, the last value wins, which
/// matches how flat query maps are handed to the validator.
pub fn parse_query_string(raw: &str) -> Map<String, Value> {
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// Rewrite `name[0]`, `name[1]`, ... keys into an array under `name`.
///
/// Each value lands at its declared index; gaps become `null`. An existing
/// array under `name` is extended in place, and an existing scalar becomes
/// element 0 unless an explicit `name[0]` replaces it. Keys whose index
/// exceeds `max_index` are left as they are. Other keys pass through.
///
/// Runs before coercion so that array/scalar detection sees the rebuilt shape.
pub fn normalize_query_arrays(query: &mut Map<String, Value>, max_index: usize) {
    let mut groups: BTreeMap<String, Vec<(usize, String)>> = BTreeMap::new();

    for key in query.keys() {
        let Some(captures) = ARRAY_INDEX_KEY.captures(key) else {
            continue;
        };
        let (Some(base), Some(index)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        match index.as_str().parse::<usize>() {
            Ok(index) if index <= max_index => {
                groups
                    .entry(base.as_str().to_string())
                    .or_default()
                    .push((index, key.clone()));
            }
            _ => {
                debug!(key = %key, max_index, "Query array index out of range, key left as-is");
            }
        }
    }

    for (base, entries) in groups {
        let mut array = match query.remove(&base) {
            Some(Value::Array(existing)) => existing,
            Some(scalar) => vec![scalar],
            None => Vec::new(),
        };
        for (index, key) in entries {
            let Some(value) = query.remove(&key) else {
                continue;
            };
            if array.len() <= index {
                array.resize(index + 1, Value::Null);
            }
            array[index] = value;
        }
        query.insert(base, Value::Array(array));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_query_string_decodes() {
        let q = parse_query_string("?name=a%20b&array%5B0%5D=x&flag=true");
        assert_eq!(q.get("name"), Some(&json!("a b")));
        assert_eq!(q.get("array[0]"), Some(&json!("x")));
        assert_eq!(q.get("flag"), Some(&json!("true")));
    }

    #[test]
    fn test_indices_become_array() {
        let mut q = map(json!({"array[0]": "a", "array[1]": "b", "other": "c"}));
        normalize_query_arrays(&mut q, DEFAULT_MAX_QUERY_ARRAY_INDEX);
        assert_eq!(Value::Object(q), json!({"array": ["a", "b"], "other": "c"}));
    }

    #[test]
    fn test_out_of_order_and_gaps() {
        let mut q = map(json!({"ids[2]": "z", "ids[0]": "x"}));
        normalize_query_arrays(&mut q, DEFAULT_MAX_QUERY_ARRAY_INDEX);
        assert_eq!(Value::Object(q), json!({"ids": ["x", null, "z"]}));
    }

    #[test]
    fn test_non_numeric_brackets_pass_through() {
        let mut q = map(json!({"array[fnord]": "1", "array[]": "2"}));
        normalize_query_arrays(&mut q, DEFAULT_MAX_QUERY_ARRAY_INDEX);
        assert_eq!(Value::Object(q), json!({"array[fnord]": "1", "array[]": "2"}));
    }

    #[test]
    fn test_existing_scalar_kept_as_first_element() {
        let mut q = map(json!({"tag": "first", "tag[1]": "second"}));
        normalize_query_arrays(&mut q, DEFAULT_MAX_QUERY_ARRAY_INDEX);
        assert_eq!(Value::Object(q), json!({"tag": ["first", "second"]}));
    }

    #[test]
    fn test_existing_array_extended() {
        let mut q = map(json!({"tag": ["a"], "tag[2]": "c"}));
        normalize_query_arrays(&mut q, DEFAULT_MAX_QUERY_ARRAY_INDEX);
        assert_eq!(Value::Object(q), json!({"tag": ["a", null, "c"]}));
    }

    #[test]
    fn test_index_above_limit_left_alone() {
        let mut q = map(json!({"a[5]": "x", "a[0]": "y"}));
        normalize_query_arrays(&mut q, 3);
        assert_eq!(Value::Object(q), json!({"a": ["y"], "a[5]": "x"}));
    }

    #[test]
    fn test_nested_brackets_use_last_index() {
        let mut q = map(json!({"m[0][1]": "v"}));
        normalize_query_arrays(&mut q, DEFAULT_MAX_QUERY_ARRAY_INDEX);
        assert_eq!(Value::Object(q), json!({"m[0]": [null, "v"]}));
    }
}
