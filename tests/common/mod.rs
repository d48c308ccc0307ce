//! In-memory store for integration tests
//!
//! Understands exactly the statements the `dao` builder produces for
//! equality filters: `SELECT`, multi-row `INSERT`, `UPDATE` and `DELETE`,
//! with optional `ORDER BY` and `LIMIT`.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::vec::IntoIter;

use daoforge::dao::{
    CancelHandle, Context, DaoError, ExecResult, Executor, Record, Row, Store, Transaction,
};
use serde::Deserialize;
use serde_json::Value;

#[path = "../generated/users.rs"]
pub mod users;

pub use users::Users;

/// Point at which the store can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Begin,
    Select,
    Insert,
    Update,
    Delete,
    Commit,
    Rollback,
}

/// Number of calls the store has seen per stage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counts {
    pub begins: usize,
    pub selects: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    rows: BTreeMap<String, Vec<Row>>,
    next_id: BTreeMap<String, i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Tables,
    pub counts: Counts,
    pub statements: Vec<String>,
    fail_at: Option<Stage>,
    cancel_after_select: Option<CancelHandle>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with `rows`; new identities continue after the largest `id`
    pub fn with_table(mut self, table: &str, rows: Vec<Row>) -> Self {
        let max_id = rows
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        self.tables.next_id.insert(table.to_string(), max_id);
        self.tables.rows.insert(table.to_string(), rows);
        self
    }

    /// Make every call at `stage` fail with a store error
    pub fn fail_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Cancel `handle` right after the next select returns
    pub fn cancel_after_select(mut self, handle: CancelHandle) -> Self {
        self.cancel_after_select = Some(handle);
        self
    }

    /// Committed rows of `table`
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.rows.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Committed rows of `table` decoded as `R`
    pub fn records<R: Record>(&self) -> Vec<R> {
        self.rows(R::TABLE)
            .iter()
            .map(|row| R::deserialize(Value::Object(row.clone())).unwrap())
            .collect()
    }

    fn check(&self, stage: Stage) -> Result<(), DaoError> {
        if self.fail_at == Some(stage) {
            return Err(DaoError::Store(format!("injected {:?} failure", stage)));
        }
        Ok(())
    }

    fn run_query(
        &mut self,
        tables: &Tables,
        query: &str,
        args: &[Value],
    ) -> Result<Vec<Row>, DaoError> {
        self.statements.push(query.to_string());
        self.counts.selects += 1;
        self.check(Stage::Select)?;

        let rows = tables.select(query, args);
        if let Some(handle) = self.cancel_after_select.take() {
            handle.cancel();
        }
        Ok(rows)
    }

    fn run_execute(
        &mut self,
        tables: &mut Tables,
        query: &str,
        args: &[Value],
    ) -> Result<ExecResult, DaoError> {
        self.statements.push(query.to_string());
        let stage = if query.starts_with("INSERT") {
            self.counts.inserts += 1;
            Stage::Insert
        } else if query.starts_with("UPDATE") {
            self.counts.updates += 1;
            Stage::Update
        } else if query.starts_with("DELETE") {
            self.counts.deletes += 1;
            Stage::Delete
        } else {
            panic!("unsupported statement: {query}");
        };
        self.check(stage)?;

        Ok(match stage {
            Stage::Insert => tables.insert(query, args),
            Stage::Update => tables.update(query, args),
            _ => tables.delete(query, args),
        })
    }
}

impl Executor for MemoryStore {
    fn query(&mut self, _ctx: &Context, query: &str, args: &[Value]) -> Result<Vec<Row>, DaoError> {
        let tables = std::mem::take(&mut self.tables);
        let result = self.run_query(&tables, query, args);
        self.tables = tables;
        result
    }

    fn execute(
        &mut self,
        _ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<ExecResult, DaoError> {
        let mut tables = std::mem::take(&mut self.tables);
        let result = self.run_execute(&mut tables, query, args);
        self.tables = tables;
        result
    }
}

impl Store for MemoryStore {
    type Tx<'t> = MemoryTx<'t>;

    fn begin(&mut self, _ctx: &Context) -> Result<MemoryTx<'_>, DaoError> {
        self.counts.begins += 1;
        self.check(Stage::Begin)?;
        let staged = self.tables.clone();
        Ok(MemoryTx {
            store: self,
            staged,
        })
    }
}

/// Transaction over a snapshot; commit publishes the snapshot
pub struct MemoryTx<'a> {
    store: &'a mut MemoryStore,
    staged: Tables,
}

impl Executor for MemoryTx<'_> {
    fn query(&mut self, _ctx: &Context, query: &str, args: &[Value]) -> Result<Vec<Row>, DaoError> {
        self.store.run_query(&self.staged, query, args)
    }

    fn execute(
        &mut self,
        _ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<ExecResult, DaoError> {
        self.store.run_execute(&mut self.staged, query, args)
    }
}

impl Transaction for MemoryTx<'_> {
    fn commit(self) -> Result<(), DaoError> {
        self.store.counts.commits += 1;
        self.store.check(Stage::Commit)?;
        self.store.tables = self.staged;
        Ok(())
    }

    fn rollback(self) -> Result<(), DaoError> {
        self.store.counts.rollbacks += 1;
        self.store.check(Stage::Rollback)
    }
}

/// Equality filter, ordering, limit and offset parsed from a statement tail
struct Filter {
    predicates: Vec<(String, Option<Value>)>,
    /// Column and descending flag per `ORDER BY` term
    order_by: Vec<(String, bool)>,
    limit: Option<usize>,
    offset: usize,
}

impl Filter {
    fn parse(tail: &str, args: &mut IntoIter<Value>) -> Self {
        let (body, limit) = match tail.split_once(" LIMIT ") {
            Some((body, limit)) => (body, Some(limit)),
            None => (tail, None),
        };
        let (body, order_by) = match body.split_once(" ORDER BY ") {
            Some((body, terms)) => (body, parse_order_by(terms)),
            None => (body, Vec::new()),
        };

        let predicates = match body.strip_prefix(" WHERE ") {
            Some(clause) => clause
                .split(" AND ")
                .map(|predicate| {
                    if let Some(column) = predicate.strip_suffix(" IS NULL") {
                        (unquote(column), None)
                    } else if let Some(column) = predicate.strip_suffix(" = ?") {
                        (unquote(column), args.next())
                    } else {
                        panic!("unsupported predicate: {predicate}")
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        let mut next_usize = || args.next().and_then(|v| v.as_u64()).unwrap() as usize;
        let (offset, limit) = match limit {
            Some("?") => (0, Some(next_usize())),
            Some("?, ?") => {
                let offset = next_usize();
                (offset, Some(next_usize()))
            }
            Some(other) => panic!("unsupported limit: {other}"),
            None => (0, None),
        };

        Self {
            predicates,
            order_by,
            limit,
            offset,
        }
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        self.order_by
            .iter()
            .map(|(column, descending)| {
                let ordering = compare_values(a.get(column), b.get(column));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|(column, value)| match value {
            Some(value) => row.get(column) == Some(value),
            None => row.get(column).map_or(true, Value::is_null),
        })
    }
}

impl Tables {
    fn select(&self, query: &str, args: &[Value]) -> Vec<Row> {
        let rest = query.strip_prefix("SELECT ").unwrap();
        let (fields, rest) = rest.split_once(" FROM ").unwrap();
        let (table, tail) = split_table(rest);
        let mut args = args.to_vec().into_iter();
        let filter = Filter::parse(tail, &mut args);

        let columns: Option<Vec<String>> =
            (fields != "*").then(|| fields.split(", ").map(unquote).collect());

        let mut matched: Vec<&Row> = self
            .rows
            .get(&table)
            .into_iter()
            .flatten()
            .filter(|row| filter.matches(row))
            .collect();
        matched.sort_by(|a, b| filter.compare(a, b));
        let matched = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX));

        matched
            .map(|row| match &columns {
                Some(columns) => columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect(),
                None => row.clone(),
            })
            .collect()
    }

    fn insert(&mut self, query: &str, args: &[Value]) -> ExecResult {
        let rest = query.strip_prefix("INSERT INTO ").unwrap();
        let (table, rest) = rest.split_once(" (").unwrap();
        let table = unquote(table);
        let (columns, _) = rest.split_once(") VALUES ").unwrap();
        let columns: Vec<String> = columns.split(", ").map(unquote).collect();

        let next_id = self.next_id.entry(table.clone()).or_insert(0);
        let rows = self.rows.entry(table).or_default();
        let mut last_insert_id = 0;
        for values in args.chunks(columns.len()) {
            let mut row: Row = columns.iter().cloned().zip(values.iter().cloned()).collect();
            match row.get("id").and_then(Value::as_i64) {
                Some(id) => *next_id = (*next_id).max(id),
                None => {
                    *next_id += 1;
                    row.insert("id".to_string(), Value::from(*next_id));
                }
            }
            last_insert_id = *next_id;
            rows.push(row);
        }

        ExecResult {
            last_insert_id,
            rows_affected: (args.len() / columns.len()) as u64,
        }
    }

    fn update(&mut self, query: &str, args: &[Value]) -> ExecResult {
        let rest = query.strip_prefix("UPDATE ").unwrap();
        let (table, rest) = rest.split_once(" SET ").unwrap();
        let (assignments, tail) = match rest.find(" WHERE ") {
            Some(at) => rest.split_at(at),
            None => (rest, ""),
        };

        let mut args = args.to_vec().into_iter();
        let assignments: Vec<(String, Value)> = assignments
            .split(", ")
            .map(|a| {
                let column = a.strip_suffix(" = ?").unwrap();
                (unquote(column), args.next().unwrap())
            })
            .collect();
        let filter = Filter::parse(tail, &mut args);

        let mut rows_affected = 0;
        for row in self.rows.entry(unquote(table)).or_default() {
            if filter.matches(row) {
                for (column, value) in &assignments {
                    row.insert(column.clone(), value.clone());
                }
                rows_affected += 1;
            }
        }

        ExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn delete(&mut self, query: &str, args: &[Value]) -> ExecResult {
        let rest = query.strip_prefix("DELETE FROM ").unwrap();
        let (table, tail) = split_table(rest);
        let mut args = args.to_vec().into_iter();
        let filter = Filter::parse(tail, &mut args);

        let rows = self.rows.entry(table).or_default();
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));

        ExecResult {
            last_insert_id: 0,
            rows_affected: (before - rows.len()) as u64,
        }
    }
}

fn parse_order_by(terms: &str) -> Vec<(String, bool)> {
    terms
        .split(", ")
        .map(|term| match term.rsplit_once(' ') {
            Some((column, "DESC")) => (unquote(column), true),
            Some((column, "ASC")) => (unquote(column), false),
            _ => (unquote(term), false),
        })
        .collect()
}

/// Numbers compare numerically, everything else by its JSON text
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(Value::as_f64), b.and_then(Value::as_f64)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => {
            let text = |v: Option<&Value>| v.map(Value::to_string).unwrap_or_default();
            text(a).cmp(&text(b))
        }
    }
}

fn split_table(rest: &str) -> (String, &str) {
    match rest.find(' ') {
        Some(at) => (unquote(&rest[..at]), &rest[at..]),
        None => (unquote(rest), ""),
    }
}

fn unquote(name: &str) -> String {
    name.trim().replace('`', "")
}

/// Record without an identity column
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct Tags {
    #[serde(rename = "label")]
    pub label: String,
}

impl Record for Tags {
    const NAME: &'static str = "Tags";
    const TABLE: &'static str = "tags";
    const COLUMNS: &'static [&'static str] = &["label"];

    fn identity(&self) -> Option<i64> {
        None
    }
}

/// One `users` row; `None` stores NULL
pub fn user_row(id: i64, user_name: Option<&str>) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), Value::from(id));
    row.insert("user_name".to_string(), Value::from(user_name));
    row
}

pub fn user(id: i32, user_name: &str) -> Users {
    Users {
        id,
        user_name: Some(user_name.to_string()),
    }
}
