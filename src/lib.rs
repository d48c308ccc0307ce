//! # daoforge
//!
//! Generate a record struct and a DAO layer from a table's live schema
//!
//! This crate provides a CLI tool and library for reading a table's column
//! metadata and emitting typed Rust data access code, plus the small `dao`
//! runtime that generated code calls.

pub mod codegen;
pub mod config;
pub mod dao;
pub mod error;
pub mod introspect;
pub mod schema;

pub mod prelude {
    pub use crate::codegen::{CodeGenConfig, CodeGenerator, Emit, RustGenerator};
    pub use crate::config::DbConfig;
    pub use crate::dao::{CommitPolicy, Context, DaoError, Record};
    pub use crate::error::ForgeError;
    pub use crate::introspect::{CatalogIntrospector, Introspector};
    pub use crate::schema::{
        ColumnDescriptor, DataType, GenerationUnit, MappedField, SkippedColumn, UnmappedPolicy,
    };
}

#[cfg(feature = "mysql")]
pub use dao::MysqlStore;
