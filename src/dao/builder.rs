//! Map-based statement builder
//!
//! Turns `where`/`data` maps into a query string with `?` placeholders and
//! the matching argument list. Keys of a `where` map are either a column
//! name (equality) or a column followed by an operator, e.g. `"age >"`,
//! `"name like"`, `"id in"`. Two special keys are understood:
//!
//! - `_orderby`: `"col [asc|desc], ..."`
//! - `_limit`: `n` or `[offset, n]`
//!
//! ```
//! use daoforge::dao::{builder, conditions};
//! use serde_json::json;
//!
//! let (query, args) = builder::build_select(
//!     "users",
//!     &conditions(json!({"age >": 18, "_orderby": "id desc"})),
//!     None,
//! )
//! .unwrap();
//! assert_eq!(query, "SELECT * FROM `users` WHERE `age` > ? ORDER BY `id` DESC");
//! assert_eq!(args, vec![json!(18)]);
//! ```

use serde_json::Value;

use super::{BuildError, Conditions};

const ORDER_BY_KEY: &str = "_orderby";
const LIMIT_KEY: &str = "_limit";

/// Built statement: query text and positional arguments
pub type Statement = (String, Vec<Value>);

/// Build a `SELECT` over `table` filtered by `conditions`
///
/// `fields` of `None` or empty selects `*`.
pub fn build_select(
    table: &str,
    conditions: &Conditions,
    fields: Option<&[&str]>,
) -> Result<Statement, BuildError> {
    let table = quote_table(table)?;
    let columns = match fields {
        Some(fields) if !fields.is_empty() => fields
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Result<Vec<_>, _>>()?
            .join(", "),
        _ => "*".to_string(),
    };

    let clauses = Clauses::parse(conditions, true)?;
    let mut query = format!("SELECT {} FROM {}", columns, table);
    let args = clauses.append_to(&mut query, Vec::new());
    Ok((query, args))
}

/// Build one multi-row `INSERT` for `records`
///
/// Every record must carry the same set of columns.
pub fn build_insert(table: &str, records: &[Conditions]) -> Result<Statement, BuildError> {
    let table = quote_table(table)?;
    let first = records.first().ok_or(BuildError::EmptyInsert)?;
    if first.is_empty() {
        return Err(BuildError::EmptyInsert);
    }

    let columns: Vec<&String> = first.keys().collect();
    let quoted = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>, _>>()?;
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));

    let mut args = Vec::with_capacity(columns.len() * records.len());
    for record in records {
        if record.len() != columns.len() {
            return Err(BuildError::MismatchedColumns);
        }
        for column in &columns {
            let value = record.get(*column).ok_or(BuildError::MismatchedColumns)?;
            args.push(scalar(column, value)?);
        }
    }

    let query = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        quoted.join(", "),
        vec![placeholders; records.len()].join(", ")
    );
    Ok((query, args))
}

/// Build an `UPDATE` of `table` setting `data` where `conditions` hold
pub fn build_update(
    table: &str,
    conditions: &Conditions,
    data: &Conditions,
) -> Result<Statement, BuildError> {
    let table = quote_table(table)?;
    if data.is_empty() {
        return Err(BuildError::EmptyUpdate);
    }

    let mut assignments = Vec::with_capacity(data.len());
    let mut args = Vec::with_capacity(data.len());
    for (column, value) in data {
        assignments.push(format!("{} = ?", quote_ident(column)?));
        args.push(scalar(column, value)?);
    }

    let clauses = Clauses::parse(conditions, false)?;
    let mut query = format!("UPDATE {} SET {}", table, assignments.join(", "));
    let args = clauses.append_to(&mut query, args);
    Ok((query, args))
}

/// Build a `DELETE` from `table` where `conditions` hold
pub fn build_delete(table: &str, conditions: &Conditions) -> Result<Statement, BuildError> {
    let table = quote_table(table)?;
    let clauses = Clauses::parse(conditions, false)?;
    let mut query = format!("DELETE FROM {}", table);
    let args = clauses.append_to(&mut query, Vec::new());
    Ok((query, args))
}

/// WHERE / ORDER BY / LIMIT parts parsed out of a conditions map
#[derive(Debug, Default)]
struct Clauses {
    predicates: Vec<String>,
    args: Vec<Value>,
    order_by: Option<String>,
    limit: Option<(String, Vec<Value>)>,
}

impl Clauses {
    fn parse(conditions: &Conditions, allow_offset: bool) -> Result<Self, BuildError> {
        let mut clauses = Clauses::default();

        for (key, value) in conditions {
            match key.as_str() {
                ORDER_BY_KEY => clauses.order_by = Some(order_by(value)?),
                LIMIT_KEY => clauses.limit = Some(limit(value, allow_offset)?),
                _ => clauses.push_predicate(key, value)?,
            }
        }

        Ok(clauses)
    }

    fn push_predicate(&mut self, key: &str, value: &Value) -> Result<(), BuildError> {
        let (column, op) = split_key(key)?;
        let column = quote_ident(column)?;

        match (op.as_str(), value) {
            ("=", Value::Null) => self.predicates.push(format!("{} IS NULL", column)),
            ("!=" | "<>", Value::Null) => {
                self.predicates.push(format!("{} IS NOT NULL", column))
            }
            (_, Value::Null) => {
                return Err(BuildError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("null cannot be compared with '{}'", op),
                })
            }
            ("in" | "not in", Value::Array(items)) => {
                if items.is_empty() {
                    return Err(BuildError::InvalidValue {
                        key: key.to_string(),
                        reason: "empty list".to_string(),
                    });
                }
                for item in items {
                    self.args.push(scalar(key, item)?);
                }
                self.predicates.push(format!(
                    "{} {} ({})",
                    column,
                    op.to_uppercase(),
                    vec!["?"; items.len()].join(", ")
                ));
            }
            ("in" | "not in", _) => {
                return Err(BuildError::InvalidValue {
                    key: key.to_string(),
                    reason: "expected a list".to_string(),
                })
            }
            (_, value) => {
                self.args.push(scalar(key, value)?);
                self.predicates
                    .push(format!("{} {} ?", column, op.to_uppercase()));
            }
        }

        Ok(())
    }

    /// Append the clauses to `query`, returning `args` extended in placeholder order
    fn append_to(self, query: &mut String, mut args: Vec<Value>) -> Vec<Value> {
        if !self.predicates.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&self.predicates.join(" AND "));
            args.extend(self.args);
        }
        if let Some(order_by) = self.order_by {
            query.push_str(" ORDER BY ");
            query.push_str(&order_by);
        }
        if let Some((limit, limit_args)) = self.limit {
            query.push(' ');
            query.push_str(&limit);
            args.extend(limit_args);
        }
        args
    }
}

/// Split `"col op"` into its column and a normalized operator
fn split_key(key: &str) -> Result<(&str, String), BuildError> {
    let key = key.trim();
    let Some((column, op)) = key.split_once(char::is_whitespace) else {
        return Ok((key, "=".to_string()));
    };

    let op = op
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    match op.as_str() {
        "=" | "!=" | "<>" | ">" | ">=" | "<" | "<=" | "like" | "not like" | "in" | "not in" => {
            Ok((column, op))
        }
        _ => Err(BuildError::UnsupportedOperator {
            key: key.to_string(),
            op,
        }),
    }
}

fn order_by(value: &Value) -> Result<String, BuildError> {
    let Value::String(spec) = value else {
        return Err(BuildError::InvalidOrderBy(value.to_string()));
    };

    let mut terms = Vec::new();
    for term in spec.split(',') {
        let mut tokens = term.split_whitespace();
        let column = tokens
            .next()
            .ok_or_else(|| BuildError::InvalidOrderBy(spec.clone()))?;
        let direction = match tokens.next().map(|d| d.to_lowercase()) {
            None => None,
            Some(d) if d == "asc" => Some("ASC"),
            Some(d) if d == "desc" => Some("DESC"),
            Some(_) => return Err(BuildError::InvalidOrderBy(spec.clone())),
        };
        if tokens.next().is_some() {
            return Err(BuildError::InvalidOrderBy(spec.clone()));
        }

        let column = quote_ident(column).map_err(|_| BuildError::InvalidOrderBy(spec.clone()))?;
        terms.push(match direction {
            Some(direction) => format!("{} {}", column, direction),
            None => column,
        });
    }

    Ok(terms.join(", "))
}

fn limit(value: &Value, allow_offset: bool) -> Result<(String, Vec<Value>), BuildError> {
    let count = |v: &Value| {
        v.as_u64()
            .ok_or_else(|| BuildError::InvalidLimit(format!("'{}' is not a non-negative integer", v)))
    };

    match value {
        Value::Array(items) if items.len() == 1 => {
            Ok(("LIMIT ?".to_string(), vec![Value::from(count(&items[0])?)]))
        }
        Value::Array(items) if items.len() == 2 => {
            if !allow_offset {
                return Err(BuildError::InvalidLimit(
                    "offset is only allowed on select".to_string(),
                ));
            }
            let offset = count(&items[0])?;
            let rows = count(&items[1])?;
            Ok((
                "LIMIT ?, ?".to_string(),
                vec![Value::from(offset), Value::from(rows)],
            ))
        }
        Value::Array(_) => Err(BuildError::InvalidLimit(
            "expected [n] or [offset, n]".to_string(),
        )),
        _ => Ok(("LIMIT ?".to_string(), vec![Value::from(count(value)?)])),
    }
}

/// Accept only values that bind to a single placeholder
fn scalar(key: &str, value: &Value) -> Result<Value, BuildError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(BuildError::InvalidValue {
            key: key.to_string(),
            reason: "nested values cannot be bound".to_string(),
        }),
        _ => Ok(value.clone()),
    }
}

fn quote_table(table: &str) -> Result<String, BuildError> {
    if table.trim().is_empty() {
        return Err(BuildError::EmptyTable);
    }
    quote_ident(table)
}

/// Backtick-quote an identifier, quoting each part of a dotted name
fn quote_ident(name: &str) -> Result<String, BuildError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BuildError::InvalidIdentifier(name.to_string()));
    }

    name.split('.')
        .map(|part| {
            if part.is_empty() || part.contains('`') {
                Err(BuildError::InvalidIdentifier(name.to_string()))
            } else {
                Ok(format!("`{}`", part))
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|parts| parts.join("."))
}
