//! Item Conditions
//!
//! `{key/field, operator, value}` triples shared by the rule evaluators.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cart::{LineItem, lenient},
    rules::de,
};

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Operator {
    /// Stringified values are equal (or numerically equal).
    Equals,

    /// Negation of [`Operator::Equals`]; an absent value is not equal.
    NotEquals,

    /// Substring test on the stringified value.
    Contains,

    /// Value is present and not an empty string.
    Exists,

    /// Numeric less-than.
    LessThan,

    /// Numeric greater-than.
    GreaterThan,

    /// Anything unrecognised, kept as written. Never matches.
    ///
    /// A missing operator is `Unknown(Value::Null)`.
    Unknown(Value),
}

impl Default for Operator {
    fn default() -> Self {
        Self::Unknown(Value::Null)
    }
}

impl Operator {
    /// Wire name of the operator; the raw text for an unrecognised one.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not-equals",
            Self::Contains => "contains",
            Self::Exists => "exists",
            Self::LessThan => "less-than",
            Self::GreaterThan => "greater-than",
            Self::Unknown(Value::String(name)) => name,
            Self::Unknown(_) => "unknown",
        }
    }

    /// Whether the operator compares against a configured value.
    pub fn needs_value(&self) -> bool {
        !matches!(self, Self::Exists)
    }

    /// Whether the operator is one of the supported comparisons.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    fn is_missing(&self) -> bool {
        matches!(self, Self::Unknown(Value::Null))
    }
}

impl From<&str> for Operator {
    fn from(name: &str) -> Self {
        match name.trim() {
            "equals" => Self::Equals,
            "not-equals" | "not_equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "exists" => Self::Exists,
            "less-than" | "less_than" => Self::LessThan,
            "greater-than" | "greater_than" => Self::GreaterThan,
            _ => Self::Unknown(Value::String(name.to_string())),
        }
    }
}

impl From<Value> for Operator {
    fn from(value: Value) -> Self {
        match value {
            Value::String(name) => Self::from(name.as_str()),
            other => Self::Unknown(other),
        }
    }
}

impl From<Operator> for Value {
    fn from(operator: Operator) -> Self {
        match operator {
            Operator::Unknown(raw) => raw,
            known => Self::String(known.as_str().to_string()),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Where a condition looks up its operand on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionSource {
    /// `condition.key` inside the item's properties.
    Property,

    /// `condition.field` as a dotted path on the item.
    Field,
}

/// A single item predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Property name, used with [`ConditionSource::Property`].
    #[serde(default, deserialize_with = "de::string", skip_serializing_if = "String::is_empty")]
    pub key: String,

    /// Dotted field path, used with [`ConditionSource::Field`].
    #[serde(default, deserialize_with = "de::string", skip_serializing_if = "String::is_empty")]
    pub field: String,

    /// Comparison operator; missing means [`Operator::Unknown`].
    #[serde(default, skip_serializing_if = "Operator::is_missing")]
    pub operator: Operator,

    /// Operand to compare against.
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    /// Condition on a line item property.
    pub fn property(key: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            key: key.into(),
            operator,
            value,
            ..Self::default()
        }
    }

    /// Condition on a dotted item field path.
    pub fn field(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            ..Self::default()
        }
    }

    /// Name looked up for `source`, falling back to the other name when empty.
    pub fn target(&self, source: ConditionSource) -> &str {
        let (preferred, fallback) = match source {
            ConditionSource::Property => (&self.key, &self.field),
            ConditionSource::Field => (&self.field, &self.key),
        };

        if preferred.is_empty() {
            fallback
        } else {
            preferred
        }
    }

    /// Whether the condition carries everything its operator needs.
    pub fn is_well_formed(&self, source: ConditionSource) -> bool {
        !self.target(source).trim().is_empty()
            && self.operator.is_known()
            && (!self.operator.needs_value() || !self.value.is_null())
    }

    /// Human-readable expectation, e.g. `quantity less-than 5`.
    pub fn describe(&self, source: ConditionSource) -> String {
        if self.operator == Operator::Exists {
            format!("{} to exist", self.target(source))
        } else {
            format!(
                "{} {} {}",
                self.target(source),
                self.operator,
                lenient::display(&self.value)
            )
        }
    }
}

/// Evaluate `condition` against `item`.
///
/// Malformed conditions and unknown operators are false.
pub fn matches_condition(item: &LineItem, condition: &Condition, source: ConditionSource) -> bool {
    if !condition.is_well_formed(source) {
        return false;
    }

    let target = condition.target(source);

    let actual = match source {
        ConditionSource::Property => item
            .properties
            .get(target)
            .map(|value| Value::String(value.clone())),
        ConditionSource::Field => item.field(target),
    };

    let expected = &condition.value;

    match &condition.operator {
        Operator::Equals => actual.is_some_and(|actual| loosely_equal(&actual, expected)),
        Operator::NotEquals => !actual.is_some_and(|actual| loosely_equal(&actual, expected)),
        Operator::Contains => actual
            .is_some_and(|actual| lenient::display(&actual).contains(&lenient::display(expected))),
        Operator::Exists => actual.is_some_and(|actual| match actual {
            Value::String(text) => !text.is_empty(),
            other => !other.is_null(),
        }),
        Operator::LessThan => compare(actual.as_ref(), expected).is_some_and(|(a, b)| a < b),
        Operator::GreaterThan => compare(actual.as_ref(), expected).is_some_and(|(a, b)| a > b),
        Operator::Unknown(_) => false,
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    let (actual, expected) = (lenient::display(actual), lenient::display(expected));

    if actual == expected {
        return true;
    }

    match (numeric(&actual), numeric(&expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<(Decimal, Decimal)> {
    let actual = numeric(&lenient::display(actual?))?;
    let expected = numeric(&lenient::display(expected))?;

    Some((actual, expected))
}

fn numeric(text: &str) -> Option<Decimal> {
    let text = text.trim();

    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
