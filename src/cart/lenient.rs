//! Lenient coercions for storefront JSON.
//!
//! Storefront themes and apps write whatever they like into cart JSON, so
//! every scalar is accepted in any reasonable shape and anything unusable
//! collapses to its empty value.

use std::collections::BTreeMap;

use serde_json::Value;

/// Coerce a JSON value into an integer, defaulting to zero.
pub(crate) fn int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number.as_i64().unwrap_or_else(|| {
            number
                .as_f64()
                .map_or(0, |float| float_to_int(float.trunc()))
        }),
        Some(Value::String(text)) => {
            let text = text.trim();

            text.parse::<i64>().unwrap_or_else(|_| {
                text.parse::<f64>()
                    .map_or(0, |float| float_to_int(float.trunc()))
            })
        }
        _ => 0,
    }
}

/// Coerce a JSON value into an optional string.
///
/// `null` and missing values are `None`; numbers and booleans are rendered
/// as text; arrays and objects are rendered as compact JSON.
pub(crate) fn string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

/// Coerce a JSON object into a string map, dropping `null` entries.
pub(crate) fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(object)) = value else {
        return BTreeMap::new();
    };

    object
        .iter()
        .filter_map(|(key, value)| string(Some(value)).map(|value| (key.clone(), value)))
        .collect()
}

/// Render any JSON scalar the way a template would print it.
pub(crate) fn display(value: &Value) -> String {
    string(Some(value)).unwrap_or_default()
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "storefront amounts are integral minor units; saturation is acceptable"
)]
fn float_to_int(float: f64) -> i64 {
    if float.is_finite() { float as i64 } else { 0 }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn int_accepts_numbers_strings_and_garbage() {
        assert_eq!(int(Some(&json!(12))), 12);
        assert_eq!(int(Some(&json!(12.9))), 12);
        assert_eq!(int(Some(&json!(" 7 "))), 7);
        assert_eq!(int(Some(&json!("3.5"))), 3);
        assert_eq!(int(Some(&json!("abc"))), 0);
        assert_eq!(int(Some(&json!(null))), 0);
        assert_eq!(int(None), 0);
    }

    #[test]
    fn string_map_stringifies_values_and_drops_nulls() {
        let map = string_map(Some(&json!({
            "_is_gwp": true,
            "_count": 2,
            "_note": "hello",
            "_gone": null,
        })));

        assert_eq!(map.get("_is_gwp").map(String::as_str), Some("true"));
        assert_eq!(map.get("_count").map(String::as_str), Some("2"));
        assert_eq!(map.get("_note").map(String::as_str), Some("hello"));
        assert!(!map.contains_key("_gone"), "null properties should be dropped");
    }

    #[test]
    fn string_map_of_non_object_is_empty() {
        assert!(string_map(Some(&json!(["a", "b"]))).is_empty());
        assert!(string_map(None).is_empty());
    }
}
