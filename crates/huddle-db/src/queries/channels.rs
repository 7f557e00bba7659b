use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use huddle_types::models::Channel;

use super::{OptionalExt, ts_at, uuid_at};
use crate::{Database, format_ts};

fn channel_at(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: uuid_at(row, 0)?,
        workspace_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        created_at: ts_at(row, 3)?,
    })
}

pub(super) fn insert_channel(conn: &Connection, channel: &Channel) -> Result<()> {
    conn.execute(
        "INSERT INTO channels (id, workspace_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        (
            channel.id.to_string(),
            channel.workspace_id.to_string(),
            &channel.name,
            format_ts(&channel.created_at),
        ),
    )?;
    Ok(())
}

impl Database {
    pub fn insert_channel(&self, channel: &Channel) -> Result<()> {
        self.with_conn(|conn| insert_channel(conn, channel))
    }

    pub fn get_channel(&self, id: Uuid) -> Result<Option<Channel>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, workspace_id, name, created_at FROM channels WHERE id = ?1",
                [id.to_string()],
                channel_at,
            )
            .optional()
        })
    }

    /// Channels of a workspace in creation order.
    pub fn list_channels(&self, workspace_id: Uuid) -> Result<Vec<Channel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, workspace_id, name, created_at FROM channels
                 WHERE workspace_id = ?1
                 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([workspace_id.to_string()], channel_at)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_channel_name(&self, id: Uuid, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE channels SET name = ?1 WHERE id = ?2",
                (name, id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    /// Removes a channel together with its messages and their reactions.
    pub fn delete_channel(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM reactions
                 WHERE message_id IN (SELECT id FROM messages WHERE channel_id = ?1)",
                [&id],
            )?;
            tx.execute("DELETE FROM messages WHERE channel_id = ?1", [&id])?;
            let n = tx.execute("DELETE FROM channels WHERE id = ?1", [&id])?;
            Ok(n > 0)
        })
    }
}
