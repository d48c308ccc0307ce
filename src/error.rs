use thiserror::Error;

use crate::dao::DaoError;

/// daoforge errors
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    #[error("Failed to read columns of '{schema}.{table}': {source}")]
    Introspection {
        schema: String,
        table: String,
        #[source]
        source: DaoError,
    },

    #[error("Table '{schema}.{table}' has no columns or does not exist")]
    EmptyTable { schema: String, table: String },

    #[error("Unknown datatype: column '{column}', type [{column_type}]")]
    UnknownType { column: String, column_type: String },

    #[error("Code generation failed for table '{table}': {message}")]
    CodeGen { table: String, message: String },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
