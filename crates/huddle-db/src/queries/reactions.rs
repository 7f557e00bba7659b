use anyhow::Result;
use rusqlite::params_from_iter;
use uuid::Uuid;

use super::{OptionalExt, placeholders, ts_at, uuid_at};
use crate::models::ReactionRow;
use crate::{Database, format_ts, now};

impl Database {
    /// Toggle a reaction: removes if exists, inserts if not.
    /// Returns (added, id). The id is that of the inserted or removed row.
    pub fn toggle_reaction(
        &self,
        id: Uuid,
        workspace_id: Uuid,
        message_id: Uuid,
        member_id: Uuid,
        emoji: &str,
    ) -> Result<(bool, Uuid)> {
        let message_id = message_id.to_string();
        let member_id = member_id.to_string();

        self.with_tx(|tx| {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM reactions WHERE message_id = ?1 AND member_id = ?2 AND emoji = ?3",
                    (&message_id, &member_id, emoji),
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                tx.execute("DELETE FROM reactions WHERE id = ?1", [&existing_id])?;
                Ok((false, existing_id.parse()?))
            } else {
                tx.execute(
                    "INSERT INTO reactions (id, workspace_id, message_id, member_id, emoji, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    (
                        id.to_string(),
                        workspace_id.to_string(),
                        &message_id,
                        &member_id,
                        emoji,
                        format_ts(&now()),
                    ),
                )?;
                Ok((true, id))
            }
        })
    }

    /// Batch-fetch reactions for a set of message IDs, oldest first.
    pub fn reactions_for_messages(&self, message_ids: &[Uuid]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, workspace_id, message_id, member_id, emoji, created_at FROM reactions
                 WHERE message_id IN ({})
                 ORDER BY created_at, id",
                placeholders(message_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(message_ids.iter().map(|id| id.to_string())), |row| {
                    Ok(ReactionRow {
                        id: uuid_at(row, 0)?,
                        workspace_id: uuid_at(row, 1)?,
                        message_id: uuid_at(row, 2)?,
                        member_id: uuid_at(row, 3)?,
                        emoji: row.get(4)?,
                        created_at: ts_at(row, 5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
