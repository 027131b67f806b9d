//! Cartwatch prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{CartSnapshot, DiscountCode, LineItem, SnapshotError},
    diff::{CartDiff, ModifiedItem, diff, snapshots_differ},
    engine::{Failure, RuleEngine, TestResult, evaluate_rule, run_test, run_test_at},
    history::{DEFAULT_HISTORY_LIMIT, History, HistoryEntry},
    rules::{
        CartCompositionConfig, CartTest, Condition, ConditionSource, FieldValueConfig, ItemMatch,
        Operator, PropertyDependencyConfig, QuantityConfig, QuantityScope, Rule, RuleConfigError,
        RuleKind, RuleUuid, TestUuid, matches_condition,
    },
    transfer::{
        TransferError, export_history_json, export_tests_json, import_history_json,
        import_tests_json, import_tests_yaml,
    },
};
