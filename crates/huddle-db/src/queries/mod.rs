mod channels;
mod conversations;
mod members;
mod messages;
mod reactions;
mod storage;
mod users;
mod workspaces;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use huddle_types::models::{Member, Role, User};

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_uuid(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') carry no timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    parse_uuid(idx, &raw)
}

pub(crate) fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_uuid(idx, &raw))
        .transpose()
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_ts(idx, &raw))
        .transpose()
}

pub(crate) fn role_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

/// Columns read by [`member_at`], qualified by `alias`.
pub(crate) fn member_columns(alias: &str) -> String {
    format!("{a}.id, {a}.workspace_id, {a}.user_id, {a}.role, {a}.created_at", a = alias)
}

/// Reads the five columns of [`member_columns`] starting at `offset`.
pub(crate) fn member_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Member> {
    Ok(Member {
        id: uuid_at(row, offset)?,
        workspace_id: uuid_at(row, offset + 1)?,
        user_id: uuid_at(row, offset + 2)?,
        role: role_at(row, offset + 3)?,
        created_at: ts_at(row, offset + 4)?,
    })
}

/// Public user columns (no password), qualified by `alias`.
pub(crate) fn user_columns(alias: &str) -> String {
    format!("{a}.id, {a}.name, {a}.email, {a}.image, {a}.created_at", a = alias)
}

pub(crate) fn user_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, offset)?,
        name: row.get(offset + 1)?,
        email: row.get(offset + 2)?,
        image: row.get(offset + 3)?,
        created_at: ts_at(row, offset + 4)?,
    })
}

/// `?1, ?2, ...` for an `IN (...)` list of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
