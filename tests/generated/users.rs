//! Code generated by daoforge for table `users`. DO NOT EDIT.

use serde::{Deserialize, Serialize};
use daoforge::dao::{self, CommitPolicy, Conditions, Context, DaoError, Executor, Store};

/// Users is a mapping object for the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Users {
    #[serde(rename = "id")]
    pub id: i32,
    #[serde(rename = "user_name")]
    pub user_name: Option<String>,
}

impl daoforge::dao::Record for Users {
    const NAME: &'static str = "Users";
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["id", "user_name"];

    fn identity(&self) -> Option<i64> {
        Some(i64::from(self.id))
    }
}

/// GetOneUsers gets one record from table `users` by `conditions`.
pub fn get_one_users<E: Executor + ?Sized>(
    ctx: &Context,
    db: &mut E,
    conditions: &Conditions,
) -> Result<Option<Users>, DaoError> {
    dao::get_one::<E, Users>(ctx, db, conditions)
}

/// GetMultiUsers gets multiple records from table `users` by `conditions`.
pub fn get_multi_users<E: Executor + ?Sized>(
    ctx: &Context,
    db: &mut E,
    conditions: &Conditions,
) -> Result<Vec<Users>, DaoError> {
    dao::get_multi::<E, Users>(ctx, db, conditions)
}

/// InsertUsers inserts `records` into table `users` and returns the last assigned id.
pub fn insert_users<E: Executor + ?Sized>(
    ctx: &Context,
    db: &mut E,
    records: &[Conditions],
) -> Result<i64, DaoError> {
    dao::insert::<E, Users>(ctx, db, records)
}

/// UpdateUsers updates table `users` and returns the number of affected records.
pub fn update_users<E: Executor + ?Sized>(
    ctx: &Context,
    db: &mut E,
    conditions: &Conditions,
    data: &Conditions,
) -> Result<u64, DaoError> {
    dao::update::<E, Users>(ctx, db, conditions, data)
}

/// DeleteUsers deletes matched records in `users` and returns their number.
pub fn delete_users<E: Executor + ?Sized>(
    ctx: &Context,
    db: &mut E,
    conditions: &Conditions,
) -> Result<u64, DaoError> {
    dao::delete::<E, Users>(ctx, db, conditions)
}

/// UpsertUsers inserts a record into `users` if none matches `conditions`,
/// or updates the existing record otherwise, and returns the record id.
pub fn upsert_users<S: Store>(
    ctx: &Context,
    db: &mut S,
    conditions: &Conditions,
    data: &Conditions,
) -> Result<i64, DaoError> {
    dao::upsert::<S, Users>(ctx, db, conditions, data, CommitPolicy::Lenient)
}
