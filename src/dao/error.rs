use thiserror::Error;

/// Statement builder errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("table name is empty")]
    EmptyTable,

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("unsupported operator '{op}' on key '{key}'")]
    UnsupportedOperator { key: String, op: String },

    #[error("value for '{key}' is not usable here: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid _orderby '{0}'")]
    InvalidOrderBy(String),

    #[error("invalid _limit: {0}")]
    InvalidLimit(String),

    #[error("no records to insert")]
    EmptyInsert,

    #[error("insert records do not share the same columns")]
    MismatchedColumns,

    #[error("update data is empty")]
    EmptyUpdate,
}

/// Row decoding errors
#[derive(Error, Debug)]
pub enum ScanError {
    /// The query succeeded and returned zero rows
    #[error("[scanner]: empty result")]
    EmptyResult,

    #[error("[scanner]: failed to bind row: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Runtime errors surfaced by DAO operations
#[derive(Error, Debug)]
pub enum DaoError {
    #[error("Failed to build statement: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Record in '{table}' has no identity column")]
    MissingIdentity { table: String },
}

impl DaoError {
    /// True when the decoder reported a successful query with zero rows
    pub fn is_empty_result(&self) -> bool {
        matches!(self, DaoError::Scan(ScanError::EmptyResult))
    }
}
