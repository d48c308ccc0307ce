use serde_json::Value;
use tracing::debug;

use super::builder::{build_delete, build_insert, build_select, build_update};
use super::scanner::{scan_all, scan_one, ScanConfig};
use super::{Conditions, Context, DaoError, Executor, Record, ScanError};

/// Get the first record of `R::TABLE` matching `conditions`
///
/// No match is `Ok(None)`; only store and decode failures are errors.
pub fn get_one<E, R>(ctx: &Context, db: &mut E, conditions: &Conditions) -> Result<Option<R>, DaoError>
where
    E: Executor + ?Sized,
    R: Record,
{
    let mut conditions = conditions.clone();
    conditions
        .entry("_limit")
        .or_insert_with(|| Value::from(1));

    let (query, args) = build_select(R::TABLE, &conditions, Some(R::COLUMNS))?;
    debug!(query = ?query, args = ?args, "GetOne{}", R::NAME);

    ctx.check()?;
    let rows = db.query(ctx, &query, &args)?;
    match scan_one(rows, &ScanConfig::default()) {
        Ok(record) => Ok(Some(record)),
        Err(ScanError::EmptyResult) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get every record of `R::TABLE` matching `conditions`, in store order
pub fn get_multi<E, R>(ctx: &Context, db: &mut E, conditions: &Conditions) -> Result<Vec<R>, DaoError>
where
    E: Executor + ?Sized,
    R: Record,
{
    let (query, args) = build_select(R::TABLE, conditions, Some(R::COLUMNS))?;
    debug!(query = ?query, args = ?args, "GetMulti{}", R::NAME);

    ctx.check()?;
    let rows = db.query(ctx, &query, &args)?;
    Ok(scan_all(rows, &ScanConfig::default())?)
}

/// Insert `records` with one statement, returning the last assigned identity
pub fn insert<E, R>(ctx: &Context, db: &mut E, records: &[Conditions]) -> Result<i64, DaoError>
where
    E: Executor + ?Sized,
    R: Record,
{
    let (query, args) = build_insert(R::TABLE, records)?;
    debug!(query = ?query, args = ?args, "Insert{}", R::NAME);

    ctx.check()?;
    Ok(db.execute(ctx, &query, &args)?.last_insert_id)
}

/// Update records matching `conditions` with `data`, returning the affected count
pub fn update<E, R>(
    ctx: &Context,
    db: &mut E,
    conditions: &Conditions,
    data: &Conditions,
) -> Result<u64, DaoError>
where
    E: Executor + ?Sized,
    R: Record,
{
    let (query, args) = build_update(R::TABLE, conditions, data)?;
    debug!(query = ?query, args = ?args, "Update{}", R::NAME);

    ctx.check()?;
    Ok(db.execute(ctx, &query, &args)?.rows_affected)
}

/// Delete records matching `conditions`, returning the affected count
pub fn delete<E, R>(ctx: &Context, db: &mut E, conditions: &Conditions) -> Result<u64, DaoError>
where
    E: Executor + ?Sized,
    R: Record,
{
    let (query, args) = build_delete(R::TABLE, conditions)?;
    debug!(query = ?query, args = ?args, "Delete{}", R::NAME);

    ctx.check()?;
    Ok(db.execute(ctx, &query, &args)?.rows_affected)
}
