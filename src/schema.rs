//! Schema data structures
//!
//! These types represent one table's column metadata and form the contract
//! between introspection (produces) and code generation (consumes).

use serde::{Deserialize, Deserializer};
use tracing::{trace, warn};

use crate::error::ForgeError;

/// One column as read from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(rename = "COLUMN_NAME")]
    pub name: String,
    #[serde(rename = "COLUMN_TYPE")]
    pub raw_type: String,
    #[serde(rename = "COLUMN_COMMENT", default, deserialize_with = "null_as_empty")]
    pub comment: String,
    #[serde(rename = "ORDINAL_POSITION")]
    pub position: u32,
    /// `IS_NULLABLE` is `YES`
    #[serde(rename = "IS_NULLABLE", default, deserialize_with = "yes_as_true")]
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: &str, raw_type: &str, position: u32) -> Self {
        Self {
            name: name.to_string(),
            raw_type: raw_type.to_string(),
            comment: String::new(),
            position,
            nullable: false,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn yes_as_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .is_some_and(|v| v.eq_ignore_ascii_case("yes")))
}

/// Semantic type of a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    TinyInt { unsigned: bool },
    SmallInt { unsigned: bool },
    Integer { unsigned: bool },
    BigInt { unsigned: bool },
    Float,
    Double,
    Decimal,
    Text,
    Boolean,
    Date,
    DateTime,
    Time,
    Year,
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt { .. }
                | DataType::SmallInt { .. }
                | DataType::Integer { .. }
                | DataType::BigInt { .. }
        )
    }
}

/// Map a raw catalog type spelling (e.g. `int(11) unsigned`, `varchar(64)`)
///
/// Returns `None` for anything outside the supported type families.
pub fn map_type(raw_type: &str) -> Option<DataType> {
    let lower = raw_type.trim().to_lowercase();
    let base_end = lower
        .find(|c: char| c == '(' || c.is_whitespace())
        .unwrap_or(lower.len());
    let base = &lower[..base_end];
    // modifiers follow the parameter list, if any
    let modifiers = match lower.rfind(')') {
        Some(close) => &lower[close + 1..],
        None => &lower[base_end..],
    };
    let unsigned = modifiers.split_whitespace().any(|m| m == "unsigned");

    let data_type = match base {
        "tinyint" => DataType::TinyInt { unsigned },
        "smallint" => DataType::SmallInt { unsigned },
        "mediumint" | "int" | "integer" => DataType::Integer { unsigned },
        "bigint" => DataType::BigInt { unsigned },
        "float" => DataType::Float,
        "double" | "real" => DataType::Double,
        "decimal" | "numeric" => DataType::Decimal,
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set" => {
            DataType::Text
        }
        "bool" | "boolean" => DataType::Boolean,
        "date" => DataType::Date,
        "datetime" | "timestamp" => DataType::DateTime,
        "time" => DataType::Time,
        "year" => DataType::Year,
        _ => return None,
    };

    trace!(raw_type = ?raw_type, data_type = ?data_type, "Mapped column type");
    Some(data_type)
}

/// Convert snake_case to PascalCase
///
/// Each `_`-separated segment gets its first character upper-cased; the
/// rest of the segment is kept as is. Applying it to its own output is a
/// no-op.
pub fn normalize_identifier(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    let first_upper = first.to_uppercase().to_string();
                    first_upper + chars.as_str()
                }
            }
        })
        .collect()
}

/// A column mapped for emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedField {
    /// Normalized field name (`user_name` -> `UserName`)
    pub identifier: String,
    pub language_type: DataType,
    /// Original column name, emitted as the field's serialization name
    pub serialization_tag: String,
    pub comment: String,
    /// Column may hold NULL
    pub nullable: bool,
}

impl MappedField {
    /// Map one column, or `None` if its type is not supported
    pub fn from_column(column: &ColumnDescriptor) -> Option<Self> {
        let language_type = map_type(&column.raw_type)?;
        Some(Self {
            identifier: normalize_identifier(&column.name),
            language_type,
            serialization_tag: column.name.clone(),
            comment: column.comment.clone(),
            nullable: column.nullable,
        })
    }
}

/// What to do with a column whose type cannot be mapped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmappedPolicy {
    /// Drop the column from the generated code and keep going
    #[default]
    Skip,
    /// Abort generation
    Fail,
}

/// A column dropped under [`UnmappedPolicy::Skip`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedColumn {
    pub name: String,
    pub raw_type: String,
}

/// One table's mapped schema, ready for emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationUnit {
    pub table_name: String,
    pub struct_name: String,
    /// Fields in catalog declaration order
    pub fields: Vec<MappedField>,
    pub skipped: Vec<SkippedColumn>,
}

impl GenerationUnit {
    /// Map `columns` of `table_name`, keeping their order
    pub fn build(
        table_name: &str,
        columns: &[ColumnDescriptor],
        policy: UnmappedPolicy,
    ) -> Result<Self, ForgeError> {
        let mut fields = Vec::with_capacity(columns.len());
        let mut skipped = Vec::new();

        for column in columns {
            match MappedField::from_column(column) {
                Some(field) => {
                    trace!(
                        column = ?column.name,
                        identifier = ?field.identifier,
                        language_type = ?field.language_type,
                        "Mapped column"
                    );
                    fields.push(field);
                }
                None => {
                    let err = ForgeError::UnknownType {
                        column: column.name.clone(),
                        column_type: column.raw_type.clone(),
                    };
                    if policy == UnmappedPolicy::Fail {
                        return Err(err);
                    }
                    warn!(table = ?table_name, error = %err, "Skipping column");
                    skipped.push(SkippedColumn {
                        name: column.name.clone(),
                        raw_type: column.raw_type.clone(),
                    });
                }
            }
        }

        Ok(Self {
            table_name: table_name.to_string(),
            struct_name: normalize_identifier(table_name),
            fields,
            skipped,
        })
    }

    /// The field carrying the record identity: an integer column named `id`
    pub fn identity_field(&self) -> Option<&MappedField> {
        self.fields.iter().find(|f| {
            f.serialization_tag.eq_ignore_ascii_case("id") && f.language_type.is_integer()
        })
    }

    /// Name of a generated operation, verb followed by the struct name
    pub fn operation_name(&self, verb: &str) -> String {
        format!("{}{}", verb, self.struct_name)
    }

    /// Column names in field order
    pub fn column_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .map(|f| f.serialization_tag.as_str())
            .collect()
    }
}
