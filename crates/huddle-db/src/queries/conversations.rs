use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use huddle_types::models::Conversation;

use super::{OptionalExt, ts_at, uuid_at};
use crate::{Database, format_ts};

const CONVERSATION_COLUMNS: &str = "id, workspace_id, member_one_id, member_two_id, created_at";

fn conversation_at(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: uuid_at(row, 0)?,
        workspace_id: uuid_at(row, 1)?,
        member_one_id: uuid_at(row, 2)?,
        member_two_id: uuid_at(row, 3)?,
        created_at: ts_at(row, 4)?,
    })
}

impl Database {
    pub fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS),
                [id.to_string()],
                conversation_at,
            )
            .optional()
        })
    }

    /// Returns the conversation between the two members in either order,
    /// creating it with `id` when none exists yet. The flag is `true` when a
    /// new row was inserted.
    pub fn create_or_get_conversation(
        &self,
        id: Uuid,
        workspace_id: Uuid,
        member_one_id: Uuid,
        member_two_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<(Conversation, bool)> {
        let ws = workspace_id.to_string();
        let one = member_one_id.to_string();
        let two = member_two_id.to_string();

        self.with_tx(|tx| {
            let existing = tx
                .query_row(
                    &format!(
                        "SELECT {} FROM conversations
                         WHERE workspace_id = ?1
                           AND ((member_one_id = ?2 AND member_two_id = ?3)
                             OR (member_one_id = ?3 AND member_two_id = ?2))",
                        CONVERSATION_COLUMNS
                    ),
                    (&ws, &one, &two),
                    conversation_at,
                )
                .optional()?;

            if let Some(conversation) = existing {
                return Ok((conversation, false));
            }

            tx.execute(
                "INSERT INTO conversations (id, workspace_id, member_one_id, member_two_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id.to_string(), &ws, &one, &two, format_ts(&created_at)),
            )?;

            Ok((
                Conversation {
                    id,
                    workspace_id,
                    member_one_id,
                    member_two_id,
                    created_at,
                },
                true,
            ))
        })
    }
}
