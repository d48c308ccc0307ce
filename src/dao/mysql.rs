use std::borrow::Cow;

use mysql::consts::ColumnType;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, Params, TxOpts};
use serde_json::Value;
use tracing::{debug, trace};

use super::{Context, DaoError, ExecResult, Executor, Row, Store, Transaction};

/// MySQL store over a single connection
pub struct MysqlStore {
    conn: Conn,
}

impl MysqlStore {
    /// Connect with `opts`, e.g. an `OptsBuilder` or parsed `Opts`
    pub fn connect<O: Into<Opts>>(opts: O) -> Result<Self, DaoError> {
        let opts: Opts = opts.into();
        let conn = Conn::new(opts).map_err(store_error)?;
        debug!("Opened MySQL connection");
        Ok(Self { conn })
    }

    pub fn from_conn(conn: Conn) -> Self {
        Self { conn }
    }
}

impl Executor for MysqlStore {
    fn query(&mut self, ctx: &Context, query: &str, args: &[Value]) -> Result<Vec<Row>, DaoError> {
        ctx.check()?;
        run_query(&mut self.conn, ctx, query, args)
    }

    fn execute(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<ExecResult, DaoError> {
        ctx.check()?;
        self.conn.exec_drop(query, params(args)).map_err(store_error)?;
        Ok(ExecResult {
            last_insert_id: insert_id(self.conn.last_insert_id())?,
            rows_affected: self.conn.affected_rows(),
        })
    }
}

impl Store for MysqlStore {
    type Tx<'t> = MysqlTransaction<'t>;

    fn begin(&mut self, ctx: &Context) -> Result<Self::Tx<'_>, DaoError> {
        ctx.check()?;
        let tx = self
            .conn
            .start_transaction(TxOpts::default())
            .map_err(store_error)?;
        trace!("Transaction started");
        Ok(MysqlTransaction { tx })
    }
}

/// Open MySQL transaction; dropping it unfinished rolls back
pub struct MysqlTransaction<'c> {
    tx: mysql::Transaction<'c>,
}

impl Executor for MysqlTransaction<'_> {
    fn query(&mut self, ctx: &Context, query: &str, args: &[Value]) -> Result<Vec<Row>, DaoError> {
        ctx.check()?;
        run_query(&mut self.tx, ctx, query, args)
    }

    fn execute(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<ExecResult, DaoError> {
        ctx.check()?;
        self.tx.exec_drop(query, params(args)).map_err(store_error)?;
        Ok(ExecResult {
            last_insert_id: insert_id(self.tx.last_insert_id().unwrap_or_default())?,
            rows_affected: self.tx.affected_rows(),
        })
    }
}

impl Transaction for MysqlTransaction<'_> {
    fn commit(self) -> Result<(), DaoError> {
        self.tx.commit().map_err(store_error)
    }

    fn rollback(self) -> Result<(), DaoError> {
        self.tx.rollback().map_err(store_error)
    }
}

fn store_error(e: mysql::Error) -> DaoError {
    DaoError::Store(e.to_string())
}

fn insert_id(raw: u64) -> Result<i64, DaoError> {
    i64::try_from(raw)
        .map_err(|_| DaoError::Store(format!("last insert id {} does not fit in i64", raw)))
}

fn run_query<Q: Queryable>(
    conn: &mut Q,
    ctx: &Context,
    query: &str,
    args: &[Value],
) -> Result<Vec<Row>, DaoError> {
    let query = with_execution_limit(query, ctx.timeout_millis());
    let rows: Vec<mysql::Row> = conn.exec(query.as_ref(), params(args)).map_err(store_error)?;
    Ok(rows.into_iter().map(row_to_json).collect())
}

/// Bound a `SELECT` by the time left on the context
///
/// The server aborts the statement once `MAX_EXECUTION_TIME` elapses.
fn with_execution_limit(query: &str, millis: Option<u64>) -> Cow<'_, str> {
    match (millis, query.strip_prefix("SELECT ")) {
        (Some(millis), Some(rest)) => Cow::Owned(format!(
            "SELECT /*+ MAX_EXECUTION_TIME({}) */ {}",
            millis, rest
        )),
        _ => Cow::Borrowed(query),
    }
}

fn params(args: &[Value]) -> Params {
    if args.is_empty() {
        return Params::Empty;
    }
    Params::Positional(args.iter().map(to_mysql).collect())
}

fn to_mysql(value: &Value) -> mysql::Value {
    match value {
        Value::Null => mysql::Value::NULL,
        Value::Bool(b) => mysql::Value::Int(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mysql::Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                mysql::Value::UInt(u)
            } else {
                mysql::Value::Double(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => mysql::Value::Bytes(s.clone().into_bytes()),
        other => mysql::Value::Bytes(other.to_string().into_bytes()),
    }
}

fn row_to_json(row: mysql::Row) -> Row {
    let columns = row.columns();
    let values = row.unwrap();
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| {
            (
                column.name_str().into_owned(),
                to_json(column.column_type(), value),
            )
        })
        .collect()
}

/// Convert a cell to JSON in the shape serde expects for the mapped field type
fn to_json(column_type: ColumnType, value: mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(i) => Value::from(i),
        mysql::Value::UInt(u) => Value::from(u),
        mysql::Value::Float(f) => Value::from(f64::from(f)),
        mysql::Value::Double(d) => Value::from(d),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            if column_type == ColumnType::MYSQL_TYPE_DATE {
                Value::from(format!("{:04}-{:02}-{:02}", year, month, day))
            } else {
                Value::from(format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
                    year, month, day, hour, minute, second, micros
                ))
            }
        }
        mysql::Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let hours = u64::from(days) * 24 + u64::from(hours);
            Value::from(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                if negative { "-" } else { "" },
                hours,
                minutes,
                seconds,
                micros
            ))
        }
        mysql::Value::Bytes(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            match column_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_YEAR => text
                    .parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| text.parse::<u64>().map(Value::from))
                    .unwrap_or(Value::String(text)),
                ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL => text
                    .parse::<f64>()
                    .map(Value::from)
                    .unwrap_or(Value::String(text)),
                _ => Value::String(text),
            }
        }
    }
}
