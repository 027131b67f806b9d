//! Export and Import
//!
//! File-based backups of test collections and cart history. Tests export as
//! a JSON array of test objects; history exports as a JSON array of history
//! entries. Both shapes round-trip through export and import.

use thiserror::Error;

use crate::{
    history::HistoryEntry,
    rules::{CartTest, RuleUuid, TestUuid},
};

/// Errors raised while reading or writing a backup.
#[derive(Debug, Error)]
pub enum TransferError {
    /// JSON could not be read or written.
    #[error("invalid JSON backup")]
    Json(#[source] serde_json::Error),

    /// YAML could not be read.
    #[error("invalid YAML backup")]
    Yaml(#[source] serde_norway::Error),
}

/// Serialize tests as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns a [`TransferError`] if serialization fails.
pub fn export_tests_json(tests: &[CartTest]) -> Result<String, TransferError> {
    serde_json::to_string_pretty(tests).map_err(TransferError::Json)
}

/// Read tests from a JSON array, giving every test and rule a fresh id.
///
/// # Errors
///
/// Returns a [`TransferError`] if the payload is not a JSON array of objects.
pub fn import_tests_json(json: &str) -> Result<Vec<CartTest>, TransferError> {
    let tests: Vec<CartTest> = serde_json::from_str(json).map_err(TransferError::Json)?;

    Ok(tests.into_iter().map(with_fresh_ids).collect())
}

/// Read tests from a YAML sequence, giving every test and rule a fresh id.
///
/// # Errors
///
/// Returns a [`TransferError`] if the payload is not a YAML sequence of mappings.
pub fn import_tests_yaml(yaml: &str) -> Result<Vec<CartTest>, TransferError> {
    let tests: Vec<CartTest> = serde_norway::from_str(yaml).map_err(TransferError::Yaml)?;

    Ok(tests.into_iter().map(with_fresh_ids).collect())
}

/// Serialize history entries as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns a [`TransferError`] if serialization fails.
pub fn export_history_json(entries: &[HistoryEntry]) -> Result<String, TransferError> {
    serde_json::to_string_pretty(entries).map_err(TransferError::Json)
}

/// Read history entries from a JSON array.
///
/// # Errors
///
/// Returns a [`TransferError`] if the payload is not a JSON array of entries.
pub fn import_history_json(json: &str) -> Result<Vec<HistoryEntry>, TransferError> {
    serde_json::from_str(json).map_err(TransferError::Json)
}

fn with_fresh_ids(mut test: CartTest) -> CartTest {
    test.id = TestUuid::now_v7();

    for rule in &mut test.rules {
        rule.id = RuleUuid::now_v7();
    }

    test
}
