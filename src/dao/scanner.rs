//! Row decoder
//!
//! Binds result rows to record types through serde, matching row keys to
//! the record's serialization names. The key handling is chosen per call
//! with a [`ScanConfig`]; there is no process-wide decoder state.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{Row, ScanError};

/// How row keys are folded before binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyCase {
    /// Bind keys exactly as reported by the store
    #[default]
    Preserve,
    Lower,
    Upper,
}

/// Decoder configuration, passed to every decode call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanConfig {
    pub key_case: KeyCase,
}

impl ScanConfig {
    pub fn with_key_case(key_case: KeyCase) -> Self {
        Self { key_case }
    }
}

/// Decode the first row
///
/// Returns [`ScanError::EmptyResult`] when there are no rows; extra rows
/// are ignored.
pub fn scan_one<T: DeserializeOwned>(rows: Vec<Row>, config: &ScanConfig) -> Result<T, ScanError> {
    let row = rows.into_iter().next().ok_or(ScanError::EmptyResult)?;
    bind(row, config)
}

/// Decode every row, preserving order; zero rows is an empty vector
pub fn scan_all<T: DeserializeOwned>(
    rows: Vec<Row>,
    config: &ScanConfig,
) -> Result<Vec<T>, ScanError> {
    rows.into_iter().map(|row| bind(row, config)).collect()
}

fn bind<T: DeserializeOwned>(row: Row, config: &ScanConfig) -> Result<T, ScanError> {
    let row = match config.key_case {
        KeyCase::Preserve => row,
        KeyCase::Lower => fold_keys(row, str::to_lowercase),
        KeyCase::Upper => fold_keys(row, str::to_uppercase),
    };
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn fold_keys(row: Row, fold: fn(&str) -> String) -> Row {
    row.into_iter()
        .map(|(key, value)| (fold(&key), value))
        .collect::<Map<String, Value>>()
}
