//! Transactional upsert
//!
//! Begin, look up `where`, then insert `data` if the lookup found nothing
//! or update by `where` if it found a record. The transaction is always
//! finished before returning: rolled back on any error, committed otherwise.

use tracing::{debug, error};

use super::builder::{build_insert, build_select, build_update};
use super::scanner::{scan_one, ScanConfig};
use super::{Conditions, Context, DaoError, Executor, Record, ScanError, Store, Transaction};

/// What a failed commit does to an otherwise successful upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitPolicy {
    /// Log the commit failure and still report the computed identity
    #[default]
    Lenient,
    /// Report the commit failure as the upsert's error
    Strict,
}

/// Insert a record if none matches `conditions`, otherwise update the matches
///
/// Returns the newly assigned identity after an insert, or the identity of
/// the record found by the lookup after an update. Any record found counts as
/// a match; which one supplies the identity is up to the store's row order.
/// Races between the lookup and the write are only prevented by the store's
/// isolation level.
pub fn upsert<S, R>(
    ctx: &Context,
    db: &mut S,
    conditions: &Conditions,
    data: &Conditions,
    policy: CommitPolicy,
) -> Result<i64, DaoError>
where
    S: Store,
    R: Record,
{
    ctx.check()?;
    let mut tx = db.begin(ctx)?;
    let outcome = lookup_then_write::<_, R>(ctx, &mut tx, conditions, data);
    finish::<_, R>(tx, outcome, policy)
}

fn lookup_then_write<T, R>(
    ctx: &Context,
    tx: &mut T,
    conditions: &Conditions,
    data: &Conditions,
) -> Result<i64, DaoError>
where
    T: Executor,
    R: Record,
{
    let (query, args) = build_select(R::TABLE, conditions, Some(R::COLUMNS))?;
    debug!(query = ?query, args = ?args, "Upsert{}: select", R::NAME);
    ctx.check()?;
    let rows = tx.query(ctx, &query, &args)?;

    let prev: R = match scan_one(rows, &ScanConfig::default()) {
        Ok(prev) => prev,
        Err(ScanError::EmptyResult) => {
            let (query, args) = build_insert(R::TABLE, std::slice::from_ref(data))?;
            debug!(query = ?query, args = ?args, "Upsert{}: insert", R::NAME);
            ctx.check()?;
            return Ok(tx.execute(ctx, &query, &args)?.last_insert_id);
        }
        Err(e) => return Err(e.into()),
    };

    let (query, args) = build_update(R::TABLE, conditions, data)?;
    debug!(query = ?query, args = ?args, "Upsert{}: update", R::NAME);
    ctx.check()?;
    let result = tx.execute(ctx, &query, &args)?;
    debug!(rows_affected = ?result.rows_affected, "Upsert{}: updated", R::NAME);

    prev.identity().ok_or_else(|| DaoError::MissingIdentity {
        table: R::TABLE.to_string(),
    })
}

fn finish<T, R>(tx: T, outcome: Result<i64, DaoError>, policy: CommitPolicy) -> Result<i64, DaoError>
where
    T: Transaction,
    R: Record,
{
    match outcome {
        Err(err) => {
            if let Err(e) = tx.rollback() {
                error!(table = R::TABLE, error = ?e, "rollback upsert");
            }
            Err(err)
        }
        Ok(id) => match tx.commit() {
            Ok(()) => Ok(id),
            Err(e) => {
                error!(table = R::TABLE, error = ?e, "commit upsert");
                match policy {
                    CommitPolicy::Lenient => Ok(id),
                    CommitPolicy::Strict => Err(e),
                }
            }
        },
    }
}
