//! Cart Tests and Rules
//!
//! A [`CartTest`] is a named, ordered collection of typed [`Rule`]s. Rules
//! are declarative predicates over a [`CartSnapshot`](crate::cart::CartSnapshot);
//! each kind carries its own configuration and is dispatched by exhaustive
//! matching.
//!
//! Definitions are hand-edited and imported from files, so decoding never
//! rejects a test because of one bad field: unknown rule types and malformed
//! configuration evaluate to "no failures", and [`Rule::validate`] reports
//! the problem for an editor to surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{cart::LineItem, uuids::TypedUuid};

pub mod cart_composition;
pub mod condition;
pub(crate) mod de;
pub mod field_value;
pub mod property_dependency;
pub mod quantity;

pub use cart_composition::{CartCompositionConfig, ItemMatch};
pub use condition::{Condition, ConditionSource, Operator, matches_condition};
pub use field_value::FieldValueConfig;
pub use property_dependency::PropertyDependencyConfig;
pub use quantity::{QuantityConfig, QuantityScope};

/// Test identifier.
pub type TestUuid = TypedUuid<CartTest>;

/// Rule identifier.
pub type RuleUuid = TypedUuid<Rule>;

/// A problem found by [`Rule::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleConfigError {
    /// The `type` is not one of the supported rule kinds.
    #[error("unsupported rule type {0:?}")]
    UnsupportedType(String),

    /// A condition is missing its key/field, value or has an unknown operator.
    #[error("condition {0} is incomplete")]
    IncompleteCondition(&'static str),

    /// A property dependency lists no required properties.
    #[error("no required properties listed")]
    NoRequiredProperties,

    /// A cart composition match names no field.
    #[error("item match {0} has no field")]
    MissingField(&'static str),

    /// A quantity rule has no bound to check.
    #[error("quantity rule has no min, max or multiple")]
    NoBounds,

    /// A quantity rule's minimum exceeds its maximum.
    #[error("minimum {min} exceeds maximum {max}")]
    InvertedBounds {
        /// Configured minimum.
        min: i64,
        /// Configured maximum.
        max: i64,
    },

    /// A quantity rule's multiple is zero or negative.
    #[error("multiple must be positive, got {0}")]
    NonPositiveMultiple(i64),

    /// The configuration of a known rule type could not be read.
    #[error("{0} rule configuration could not be read")]
    MalformedConfig(String),
}

/// The four rule kinds, each with its configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// Triggered lines must carry companion properties.
    PropertyDependency(PropertyDependencyConfig),

    /// Triggered lines must satisfy a second field condition.
    FieldValue(FieldValueConfig),

    /// A trigger line requires some companion line in the cart.
    CartComposition(CartCompositionConfig),

    /// Quantity bounds per line or across the cart.
    Quantity(QuantityConfig),

    /// A rule type this version does not know. Never fails.
    Unsupported {
        /// The `type` as written.
        kind: String,
        /// The raw configuration, kept so it survives export.
        config: Value,
    },

    /// A known rule type whose configuration could not be read. Never fails.
    Malformed {
        /// The `type` as written.
        kind: String,
        /// The raw configuration, kept so it survives export.
        config: Value,
    },
}

impl RuleKind {
    /// Wire name of the rule type.
    pub fn type_name(&self) -> &str {
        match self {
            Self::PropertyDependency(_) => "property-dependency",
            Self::FieldValue(_) => "field-value",
            Self::CartComposition(_) => "cart-composition",
            Self::Quantity(_) => "quantity",
            Self::Unsupported { kind, .. } | Self::Malformed { kind, .. } => kind,
        }
    }
}

/// One typed predicate in a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRule", into = "RawRule")]
pub struct Rule {
    /// Identifier, unique within its test.
    pub id: RuleUuid,

    /// Display name.
    pub name: String,

    /// Kind and configuration.
    pub kind: RuleKind,
}

impl Rule {
    /// Create a rule with a fresh id.
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: RuleUuid::now_v7(),
            name: name.into(),
            kind,
        }
    }

    /// Report the first configuration problem, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleConfigError`] describing why the rule cannot fire as written.
    pub fn validate(&self) -> Result<(), RuleConfigError> {
        match &self.kind {
            RuleKind::PropertyDependency(config) => {
                if !config.if_property.is_well_formed(ConditionSource::Property) {
                    return Err(RuleConfigError::IncompleteCondition("ifProperty"));
                }

                if config.required_properties.is_empty() {
                    return Err(RuleConfigError::NoRequiredProperties);
                }
            }
            RuleKind::FieldValue(config) => {
                if !config.if_field.is_well_formed(ConditionSource::Field) {
                    return Err(RuleConfigError::IncompleteCondition("ifField"));
                }

                if !config.then_field.is_well_formed(ConditionSource::Field) {
                    return Err(RuleConfigError::IncompleteCondition("thenField"));
                }
            }
            RuleKind::CartComposition(config) => {
                if !config.if_item.is_well_formed() {
                    return Err(RuleConfigError::MissingField("ifItem"));
                }

                if !config.requires_item.is_well_formed() {
                    return Err(RuleConfigError::MissingField("requiresItem"));
                }
            }
            RuleKind::Quantity(config) => {
                if config.min.is_none() && config.max.is_none() && config.multiple.is_none() {
                    return Err(RuleConfigError::NoBounds);
                }

                if let (Some(min), Some(max)) = (config.min, config.max)
                    && min > max
                {
                    return Err(RuleConfigError::InvertedBounds { min, max });
                }

                if let Some(multiple) = config.multiple
                    && multiple <= 0
                {
                    return Err(RuleConfigError::NonPositiveMultiple(multiple));
                }
            }
            RuleKind::Unsupported { kind, .. } => {
                return Err(RuleConfigError::UnsupportedType(kind.clone()));
            }
            RuleKind::Malformed { kind, .. } => {
                return Err(RuleConfigError::MalformedConfig(kind.clone()));
            }
        }

        Ok(())
    }
}

/// A user-authored validation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartTest {
    /// Identifier.
    #[serde(default = "TestUuid::now_v7", deserialize_with = "de::id")]
    pub id: TestUuid,

    /// Display name.
    #[serde(default, deserialize_with = "de::string")]
    pub name: String,

    /// Disabled tests are skipped by bulk runs.
    #[serde(default = "enabled_by_default", deserialize_with = "de::flag")]
    pub enabled: bool,

    /// Rules evaluated in order.
    #[serde(default, deserialize_with = "rule_list")]
    pub rules: Vec<Rule>,
}

impl CartTest {
    /// Create an enabled test with a fresh id.
    pub fn new(name: impl Into<String>, rules: impl Into<Vec<Rule>>) -> Self {
        Self {
            id: TestUuid::now_v7(),
            name: name.into(),
            enabled: true,
            rules: rules.into(),
        }
    }

    /// Set whether the test runs in bulk runs.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A single rule violation before it is attributed to a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// What went wrong.
    pub message: String,

    /// Key of the offending line, if the violation concerns one.
    pub item_key: Option<String>,

    /// Title of the offending line.
    pub item_title: Option<String>,
}

impl Violation {
    /// A violation attributed to a line.
    pub fn item(item: &LineItem, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            item_key: Some(item.key.clone()),
            item_title: Some(item.display_title().to_string()),
        }
    }

    /// A cart-level violation.
    pub fn cart(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            item_key: None,
            item_title: None,
        }
    }
}

/// Violations produced by one rule.
pub type Violations = SmallVec<[Violation; 2]>;

fn enabled_by_default() -> bool {
    true
}

fn rule_list<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Vec<Rule>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;

    let Some(Value::Array(values)) = value else {
        return Ok(Vec::new());
    };

    Ok(values
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRule {
    #[serde(default = "RuleUuid::now_v7", deserialize_with = "de::id")]
    id: RuleUuid,
    #[serde(default, deserialize_with = "de::string")]
    name: String,
    #[serde(default, rename = "type", deserialize_with = "de::string")]
    kind: String,
    #[serde(default)]
    config: Value,
}

fn decode<T: for<'de> Deserialize<'de>>(
    raw: RawRule,
    typed: impl FnOnce(T) -> RuleKind,
) -> RuleKind {
    let decoded = match &raw.config {
        Value::Null => T::deserialize(&Value::Object(serde_json::Map::new())),
        config => T::deserialize(config),
    };

    match decoded {
        Ok(config) => typed(config),
        Err(_) => RuleKind::Malformed {
            kind: raw.kind,
            config: raw.config,
        },
    }
}

impl From<RawRule> for Rule {
    fn from(raw: RawRule) -> Self {
        let (id, name) = (raw.id, raw.name.clone());
        let type_name = raw.kind.trim().to_string();

        let kind = match type_name.as_str() {
            "property-dependency" => decode(raw, RuleKind::PropertyDependency),
            "field-value" => decode(raw, RuleKind::FieldValue),
            "cart-composition" => decode(raw, RuleKind::CartComposition),
            "quantity" => decode(raw, RuleKind::Quantity),
            _ => RuleKind::Unsupported {
                kind: raw.kind,
                config: raw.config,
            },
        };

        Self { id, name, kind }
    }
}

impl From<Rule> for RawRule {
    fn from(rule: Rule) -> Self {
        let kind = rule.kind.type_name().to_string();

        let config = match rule.kind {
            RuleKind::PropertyDependency(config) => serde_json::to_value(config),
            RuleKind::FieldValue(config) => serde_json::to_value(config),
            RuleKind::CartComposition(config) => serde_json::to_value(config),
            RuleKind::Quantity(config) => serde_json::to_value(config),
            RuleKind::Unsupported { config, .. } | RuleKind::Malformed { config, .. } => Ok(config),
        }
        .unwrap_or_default();

        Self {
            id: rule.id,
            name: rule.name,
            kind,
            config,
        }
    }
}
