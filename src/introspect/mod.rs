//! Table metadata introspection
//!
//! Reads a table's column definitions from a flat `COLUMNS` catalog, in
//! declaration order.

use serde_json::Value;
use tracing::{debug, error, info, trace};

use crate::dao::builder::build_select;
use crate::dao::scanner::{scan_all, KeyCase, ScanConfig};
use crate::dao::{Conditions, Context, DaoError, Executor};
use crate::prelude::{ColumnDescriptor, ForgeError};

/// Catalog table holding one row per column
pub const CATALOG_TABLE: &str = "information_schema.COLUMNS";

const CATALOG_FIELDS: &[&str] = &[
    "COLUMN_NAME",
    "COLUMN_TYPE",
    "COLUMN_COMMENT",
    "ORDINAL_POSITION",
    "IS_NULLABLE",
];

/// Trait for metadata readers
pub trait Introspector {
    /// Read the columns of `schema_name.table_name`, ordered by position
    fn read_columns(
        &mut self,
        ctx: &Context,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<ColumnDescriptor>, ForgeError>;
}

/// Reads the catalog through any [`Executor`]
pub struct CatalogIntrospector<'a, E: Executor + ?Sized> {
    db: &'a mut E,
    catalog_table: String,
}

impl<'a, E: Executor + ?Sized> CatalogIntrospector<'a, E> {
    pub fn new(db: &'a mut E) -> Self {
        Self {
            db,
            catalog_table: CATALOG_TABLE.to_string(),
        }
    }

    /// Read from a differently named catalog table with the same layout
    pub fn with_catalog_table(mut self, table: &str) -> Self {
        self.catalog_table = table.to_string();
        self
    }
}

impl<E: Executor + ?Sized> Introspector for CatalogIntrospector<'_, E> {
    fn read_columns(
        &mut self,
        ctx: &Context,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<ColumnDescriptor>, ForgeError> {
        info!(schema = ?schema_name, table = ?table_name, "Reading table columns");

        let introspection_error = |source: DaoError| {
            error!(
                schema = ?schema_name,
                table = ?table_name,
                error = ?source,
                "Failed to query columns"
            );
            ForgeError::Introspection {
                schema: schema_name.to_string(),
                table: table_name.to_string(),
                source,
            }
        };

        let mut conditions = Conditions::new();
        conditions.insert("TABLE_NAME".to_string(), Value::from(table_name));
        conditions.insert("TABLE_SCHEMA".to_string(), Value::from(schema_name));
        conditions.insert(
            "_orderby".to_string(),
            Value::from("ORDINAL_POSITION asc"),
        );

        let (query, args) = build_select(&self.catalog_table, &conditions, Some(CATALOG_FIELDS))
            .map_err(|e| introspection_error(e.into()))?;
        trace!(query = ?query, args = ?args, "Catalog query");

        ctx.check().map_err(introspection_error)?;
        let rows = self
            .db
            .query(ctx, &query, &args)
            .map_err(introspection_error)?;

        // catalogs differ in the case of their column labels
        let config = ScanConfig::with_key_case(KeyCase::Upper);
        let columns: Vec<ColumnDescriptor> =
            scan_all(rows, &config).map_err(|e| introspection_error(e.into()))?;

        if columns.is_empty() {
            error!(schema = ?schema_name, table = ?table_name, "Table has no columns");
            return Err(ForgeError::EmptyTable {
                schema: schema_name.to_string(),
                table: table_name.to_string(),
            });
        }

        for column in &columns {
            trace!(
                column = ?column.name,
                raw_type = ?column.raw_type,
                position = ?column.position,
                "Found column"
            );
        }
        debug!(table = ?table_name, columns = ?columns.len(), "Columns read");

        Ok(columns)
    }
}
