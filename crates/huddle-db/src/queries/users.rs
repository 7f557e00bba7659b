use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use huddle_types::models::User;

use super::{OptionalExt, ts_at, user_at, user_columns, uuid_at};
use crate::models::UserRow;
use crate::{Database, format_ts};

impl Database {
    pub fn create_user(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id.to_string(), name, email, password_hash, format_ts(&created_at)),
            )?;
            Ok(())
        })
    }

    /// Case-insensitive lookup, used by login and registration.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users u WHERE u.id = ?1", user_columns("u")),
                [id.to_string()],
                |row| user_at(row, 0),
            )
            .optional()
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, password, image, created_at FROM users WHERE email = ?1",
    )?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                id: uuid_at(row, 0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                image: row.get(4)?,
                created_at: ts_at(row, 5)?,
            })
        })
        .optional()?;

    Ok(row)
}
