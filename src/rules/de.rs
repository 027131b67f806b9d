//! Forgiving deserializers for hand-edited test definitions.
//!
//! A broken field never rejects the whole test: it falls back to its empty
//! value and the rule it belongs to evaluates as "no match".

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{cart::lenient, uuids::TypedUuid};

/// Any scalar as a string; `null` and missing become empty.
pub(crate) fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(lenient::string(value.as_ref()).unwrap_or_default())
}

/// A list of strings; a lone string is a one-element list, anything else is empty.
pub(crate) fn string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| lenient::string(Some(value)))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    })
}

/// A boolean flag; `"false"`, `0` and `null` are false, missing is `true`.
pub(crate) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) => !matches!(text.trim(), "false" | "0" | ""),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Null) => false,
        Some(_) | None => true,
    })
}

/// An optional integer bound: numbers and numeric strings count, `null` and
/// `""` mean unchecked.
pub(crate) fn bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// An identifier; a missing or unparseable id is replaced by a fresh one.
pub(crate) fn id<'de, D: Deserializer<'de>, T>(deserializer: D) -> Result<TypedUuid<T>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|text| text.parse::<uuid::Uuid>().ok())
        .map_or_else(TypedUuid::now_v7, TypedUuid::from_uuid))
}
