use serde_json::Value;

use super::{Context, DaoError, Row};

/// Outcome of a statement that does not return rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Identity assigned by the last insert, 0 when none
    pub last_insert_id: i64,
    pub rows_affected: u64,
}

/// Something that runs a built statement with its arguments
pub trait Executor {
    /// Run a query and return all rows keyed by column label
    fn query(&mut self, ctx: &Context, query: &str, args: &[Value]) -> Result<Vec<Row>, DaoError>;

    /// Run a statement that does not return rows
    fn execute(&mut self, ctx: &Context, query: &str, args: &[Value])
        -> Result<ExecResult, DaoError>;
}

/// A store that can open transactions
pub trait Store: Executor {
    type Tx<'t>: Transaction
    where
        Self: 't;

    fn begin(&mut self, ctx: &Context) -> Result<Self::Tx<'_>, DaoError>;
}

/// An open transaction
///
/// `commit` and `rollback` consume the handle. Implementations roll back
/// when a handle is dropped without either.
pub trait Transaction: Executor {
    fn commit(self) -> Result<(), DaoError>;

    fn rollback(self) -> Result<(), DaoError>;
}
