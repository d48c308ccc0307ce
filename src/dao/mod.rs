//! Data access runtime
//!
//! Generated DAO code is a thin typed layer over this module: a map-based
//! statement builder, a row decoder, the store traits a backend implements,
//! the five CRUD operations and the transactional upsert protocol.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub mod builder;
mod context;
mod error;
mod executor;
#[cfg(feature = "mysql")]
mod mysql;
mod ops;
pub mod scanner;
mod upsert;

pub use context::{CancelHandle, Context};
pub use error::{BuildError, DaoError, ScanError};
pub use executor::{ExecResult, Executor, Store, Transaction};
#[cfg(feature = "mysql")]
pub use mysql::{MysqlStore, MysqlTransaction};
pub use ops::{delete, get_multi, get_one, insert, update};
pub use scanner::{KeyCase, ScanConfig};
pub use upsert::{upsert, CommitPolicy};

/// One result row, keyed by column label
pub type Row = Map<String, Value>;

/// Filter (`where`) or payload (`data`) map handed to the statement builder
pub type Conditions = Map<String, Value>;

/// A struct bound to one table
///
/// Implemented by every generated record type. Rows are decoded through
/// serde, so field names on the wire are the original column names.
pub trait Record: DeserializeOwned {
    /// Normalized struct name, used as the operation label suffix
    const NAME: &'static str;
    /// Table the record maps
    const TABLE: &'static str;
    /// Column names in declaration order
    const COLUMNS: &'static [&'static str];

    /// Identity value of this record, if the table has an integer `id` column
    fn identity(&self) -> Option<i64>;
}

/// Build a `Conditions` map from a JSON object value
///
/// Non-object values yield an empty map.
pub fn conditions(value: Value) -> Conditions {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
