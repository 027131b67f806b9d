//! Rule Engine
//!
//! Evaluates cart tests against snapshots. Evaluation is stateless and
//! re-entrant: the same test, snapshot and timestamp always give the same
//! result.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    cart::CartSnapshot,
    rules::{CartTest, Rule, RuleKind, RuleUuid, TestUuid, Violation, Violations},
};

/// One rule failure within a test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Rule that failed.
    pub rule_id: RuleUuid,

    /// Name of the rule that failed.
    pub rule_name: String,

    /// What went wrong.
    pub message: String,

    /// Key of the offending line, when the failure concerns one.
    pub item_key: Option<String>,

    /// Title of the offending line.
    pub item_title: Option<String>,
}

impl Failure {
    fn from_violation(rule: &Rule, violation: Violation) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            message: violation.message,
            item_key: violation.item_key,
            item_title: violation.item_title,
        }
    }
}

/// Outcome of running one test against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test that ran.
    pub test_id: TestUuid,

    /// Name of the test that ran.
    pub test_name: String,

    /// No rule failed.
    pub passed: bool,

    /// When the evaluation happened.
    pub timestamp: Timestamp,

    /// Every failure, in rule order.
    pub failures: Vec<Failure>,
}

/// Evaluate one rule, returning its failures attributed to `rule`.
///
/// Never fails: malformed configuration yields no failures.
pub fn evaluate_rule(rule: &Rule, snapshot: &CartSnapshot) -> Vec<Failure> {
    violations(rule, snapshot)
        .into_iter()
        .map(|violation| Failure::from_violation(rule, violation))
        .collect()
}

fn violations(rule: &Rule, snapshot: &CartSnapshot) -> Violations {
    match &rule.kind {
        RuleKind::PropertyDependency(config) => config.evaluate(snapshot),
        RuleKind::FieldValue(config) => config.evaluate(snapshot),
        RuleKind::CartComposition(config) => config.evaluate(snapshot),
        RuleKind::Quantity(config) => config.evaluate(snapshot),
        RuleKind::Unsupported { .. } | RuleKind::Malformed { .. } => Violations::new(),
    }
}

/// Run every rule of `test` against `snapshot`, stamped with `timestamp`.
pub fn run_test_at(test: &CartTest, snapshot: &CartSnapshot, timestamp: Timestamp) -> TestResult {
    let failures: Vec<Failure> = test
        .rules
        .iter()
        .flat_map(|rule| evaluate_rule(rule, snapshot))
        .collect();

    TestResult {
        test_id: test.id,
        test_name: test.name.clone(),
        passed: failures.is_empty(),
        timestamp,
        failures,
    }
}

/// Run every rule of `test` against `snapshot`, stamped now.
pub fn run_test(test: &CartTest, snapshot: &CartSnapshot) -> TestResult {
    run_test_at(test, snapshot, Timestamp::now())
}

/// A collection of tests evaluated together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleEngine {
    tests: Vec<CartTest>,
}

impl RuleEngine {
    /// Create an engine over the given tests.
    pub fn new(tests: impl Into<Vec<CartTest>>) -> Self {
        Self {
            tests: tests.into(),
        }
    }

    /// Tests in their configured order.
    pub fn tests(&self) -> &[CartTest] {
        &self.tests
    }

    /// Look up a test by id.
    pub fn test(&self, id: TestUuid) -> Option<&CartTest> {
        self.tests.iter().find(|test| test.id == id)
    }

    /// Append a test.
    pub fn add(&mut self, test: CartTest) {
        self.tests.push(test);
    }

    /// Replace the test with the same id. Returns `false` if there is none.
    pub fn replace(&mut self, test: CartTest) -> bool {
        match self.tests.iter_mut().find(|existing| existing.id == test.id) {
            Some(existing) => {
                *existing = test;
                true
            }
            None => false,
        }
    }

    /// Remove a test by id, returning it.
    pub fn remove(&mut self, id: TestUuid) -> Option<CartTest> {
        let position = self.tests.iter().position(|test| test.id == id)?;

        Some(self.tests.remove(position))
    }

    /// Enable or disable a test. Returns `false` if there is no such test.
    pub fn set_enabled(&mut self, id: TestUuid, enabled: bool) -> bool {
        match self.tests.iter_mut().find(|test| test.id == id) {
            Some(test) => {
                test.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Run one test by id.
    pub fn run(&self, id: TestUuid, snapshot: &CartSnapshot) -> Option<TestResult> {
        self.test(id).map(|test| run_test(test, snapshot))
    }

    /// Run every enabled test, stamped with `timestamp`.
    pub fn run_all_tests_at(&self, snapshot: &CartSnapshot, timestamp: Timestamp) -> Vec<TestResult> {
        self.tests
            .iter()
            .filter(|test| test.enabled)
            .map(|test| run_test_at(test, snapshot, timestamp))
            .collect()
    }

    /// Run every enabled test, stamped now.
    pub fn run_all_tests(&self, snapshot: &CartSnapshot) -> Vec<TestResult> {
        self.run_all_tests_at(snapshot, Timestamp::now())
    }

    /// Consume the engine, returning its tests.
    pub fn into_tests(self) -> Vec<CartTest> {
        self.tests
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult as Outcome;

    use crate::{
        cart::LineItem,
        rules::{Condition, Operator, PropertyDependencyConfig, QuantityConfig},
    };

    use super::*;

    fn gwp_test() -> CartTest {
        CartTest::new(
            "GWP integrity",
            [
                Rule::new(
                    "GWP properties",
                    RuleKind::PropertyDependency(PropertyDependencyConfig {
                        if_property: Condition::property("_is_gwp", Operator::Equals, json!("true")),
                        required_properties: vec!["_gwp_price".into(), "_gwp_source".into()],
                    }),
                ),
                Rule::new(
                    "Max 10 per line",
                    RuleKind::Quantity(QuantityConfig::per_item().with_max(10)),
                ),
            ],
        )
    }

    fn cart() -> CartSnapshot {
        CartSnapshot::with_items(
            [
                LineItem::new("gift", 1, 1)
                    .with_title("Free Tote")
                    .with_property("_is_gwp", "true"),
                LineItem::new("bulk", 2, 12).with_title("Socks"),
            ],
            "GBP",
        )
    }

    #[test]
    fn collects_failures_in_rule_order() {
        let test = gwp_test();

        let result = run_test(&test, &cart());

        assert!(!result.passed);
        assert_eq!(result.test_id, test.id);
        assert_eq!(result.failures.len(), 2);

        let names: Vec<&str> = result.failures.iter().map(|f| f.rule_name.as_str()).collect();

        assert_eq!(names, ["GWP properties", "Max 10 per line"]);
        assert_eq!(
            result.failures.get(1).and_then(|f| f.item_title.as_deref()),
            Some("Socks")
        );
    }

    #[test]
    fn passes_with_no_failures() {
        let result = run_test(&gwp_test(), &CartSnapshot::with_items([LineItem::new("a", 1, 1)], "GBP"));

        assert!(result.passed);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn evaluation_is_deterministic() -> Outcome {
        let test = gwp_test();
        let snapshot = cart();
        let at: Timestamp = "2026-01-01T00:00:00Z".parse()?;

        let first = run_test_at(&test, &snapshot, at);
        let second = run_test_at(&test, &snapshot, at);

        assert_eq!(first, second);
        assert_eq!(serde_json::to_string(&first)?, serde_json::to_string(&second)?);

        Ok(())
    }

    #[test]
    fn unsupported_rules_never_fail() {
        let rule = Rule::new(
            "future",
            RuleKind::Unsupported {
                kind: "regex".into(),
                config: json!({}),
            },
        );

        assert!(evaluate_rule(&rule, &cart()).is_empty());
    }

    #[test]
    fn rule_failures_carry_rule_identity() -> Outcome {
        let test = gwp_test();
        let rule = test.rules.first().ok_or("gwp test has no rules")?;

        let failures = evaluate_rule(rule, &cart());

        assert!(!failures.is_empty());
        assert!(
            failures
                .iter()
                .all(|failure| failure.rule_id == rule.id && failure.rule_name == rule.name)
        );

        Ok(())
    }

    #[test]
    fn run_all_skips_disabled_tests() {
        let enabled = gwp_test();
        let disabled = gwp_test().with_enabled(false);

        let engine = RuleEngine::new([enabled.clone(), disabled]);

        let results = engine.run_all_tests(&cart());

        assert_eq!(results.len(), 1);
        assert_eq!(results.first().map(|r| r.test_id), Some(enabled.id));
    }

    #[test]
    fn manages_tests_by_id() {
        let test = gwp_test();
        let id = test.id;
        let mut engine = RuleEngine::default();

        engine.add(test.clone());

        assert!(engine.set_enabled(id, false));
        assert!(engine.run_all_tests(&cart()).is_empty());
        assert!(engine.run(id, &cart()).is_some());

        let renamed = CartTest {
            name: "Renamed".into(),
            ..test
        };

        assert!(engine.replace(renamed));
        assert_eq!(engine.test(id).map(|t| t.name.as_str()), Some("Renamed"));
        assert!(engine.remove(id).is_some());
        assert!(engine.tests().is_empty());
        assert!(!engine.set_enabled(id, true));
    }
}
