use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params_from_iter};
use uuid::Uuid;

use super::{
    OptionalExt, member_at, member_columns, opt_ts_at, opt_uuid_at, placeholders, ts_at, user_at,
    user_columns, uuid_at,
};
use crate::models::{AuthoredMessage, FeedCursor, FeedFilter, MessageRow, ThreadSummary};
use crate::{Database, format_ts};

const MESSAGE_COLUMNS: &str = "msg.id, msg.workspace_id, msg.member_id, msg.body, msg.image, \
     msg.channel_id, msg.conversation_id, msg.parent_message_id, msg.created_at, msg.updated_at";

/// Number of columns in [`MESSAGE_COLUMNS`].
const MESSAGE_WIDTH: usize = 10;

fn message_at(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: uuid_at(row, 0)?,
        workspace_id: uuid_at(row, 1)?,
        member_id: uuid_at(row, 2)?,
        body: row.get(3)?,
        image: opt_uuid_at(row, 4)?,
        channel_id: opt_uuid_at(row, 5)?,
        conversation_id: opt_uuid_at(row, 6)?,
        parent_message_id: opt_uuid_at(row, 7)?,
        created_at: ts_at(row, 8)?,
        updated_at: opt_ts_at(row, 9)?,
    })
}

fn authored_at(row: &Row<'_>) -> rusqlite::Result<AuthoredMessage> {
    Ok(AuthoredMessage {
        message: message_at(row)?,
        member: member_at(row, MESSAGE_WIDTH)?,
        user: user_at(row, MESSAGE_WIDTH + 5)?,
    })
}

fn authored_select() -> String {
    format!(
        "SELECT {}, {}, {} FROM messages msg
         JOIN members m ON m.id = msg.member_id
         JOIN users u ON u.id = m.user_id",
        MESSAGE_COLUMNS,
        member_columns("m"),
        user_columns("u")
    )
}

impl Database {
    pub fn insert_message(&self, message: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, workspace_id, member_id, body, image, channel_id,
                                       conversation_id, parent_message_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    message.id.to_string(),
                    message.workspace_id.to_string(),
                    message.member_id.to_string(),
                    message.body,
                    message.image.map(|id| id.to_string()),
                    message.channel_id.map(|id| id.to_string()),
                    message.conversation_id.map(|id| id.to_string()),
                    message.parent_message_id.map(|id| id.to_string()),
                    format_ts(&message.created_at),
                    message.updated_at.as_ref().map(format_ts),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM messages msg WHERE msg.id = ?1", MESSAGE_COLUMNS),
                [id.to_string()],
                message_at,
            )
            .optional()
        })
    }

    /// A message with its author, or `None` when the message or its author
    /// cannot be found.
    pub fn get_authored_message(&self, id: Uuid) -> Result<Option<AuthoredMessage>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE msg.id = ?1", authored_select()),
                [id.to_string()],
                authored_at,
            )
            .optional()
        })
    }

    /// One page of a feed, newest first, strictly after `cursor`.
    /// Messages whose author cannot be resolved are skipped.
    pub fn list_messages(
        &self,
        filter: &FeedFilter,
        cursor: Option<FeedCursor>,
        limit: u32,
    ) -> Result<Vec<AuthoredMessage>> {
        let sql = format!(
            "{} WHERE msg.channel_id IS ?1
                 AND msg.conversation_id IS ?2
                 AND msg.parent_message_id IS ?3
                 AND (?4 IS NULL OR msg.created_at < ?4 OR (msg.created_at = ?4 AND msg.id < ?5))
             ORDER BY msg.created_at DESC, msg.id DESC
             LIMIT ?6",
            authored_select()
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        filter.channel_id.map(|id| id.to_string()),
                        filter.conversation_id.map(|id| id.to_string()),
                        filter.parent_message_id.map(|id| id.to_string()),
                        cursor.map(|c| format_ts(&c.created_at)),
                        cursor.map(|c| c.id.to_string()),
                        limit as i64,
                    ],
                    authored_at,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Reply count and latest reply for each of the given thread roots.
    /// Roots without replies are absent from the map.
    pub fn thread_summaries(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, ThreadSummary>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT parent_message_id, reply_count, created_at, name, image FROM (
                 SELECT r.parent_message_id,
                        COUNT(*) OVER (PARTITION BY r.parent_message_id) AS reply_count,
                        r.created_at, u.name, u.image,
                        ROW_NUMBER() OVER (
                            PARTITION BY r.parent_message_id
                            ORDER BY r.created_at DESC, r.id DESC
                        ) AS rn
                 FROM messages r
                 JOIN members m ON m.id = r.member_id
                 JOIN users u ON u.id = m.user_id
                 WHERE r.parent_message_id IN ({})
             ) WHERE rn = 1",
            placeholders(parent_ids.len())
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(parent_ids.iter().map(|id| id.to_string())), |row| {
                    Ok((
                        uuid_at(row, 0)?,
                        ThreadSummary {
                            count: row.get::<_, i64>(1)? as usize,
                            last_reply_at: ts_at(row, 2)?,
                            last_reply_name: row.get(3)?,
                            last_reply_image: row.get(4)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_message_body(
        &self,
        id: Uuid,
        body: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET body = ?1, updated_at = ?2 WHERE id = ?3",
                (body, format_ts(&updated_at), id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    /// Removes a message, its thread replies, and the reactions on both.
    pub fn delete_message(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM reactions
                 WHERE message_id = ?1
                    OR message_id IN (SELECT id FROM messages WHERE parent_message_id = ?1)",
                [&id],
            )?;
            tx.execute("DELETE FROM messages WHERE parent_message_id = ?1", [&id])?;
            let n = tx.execute("DELETE FROM messages WHERE id = ?1", [&id])?;
            Ok(n > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use huddle_types::models::Member;

    use crate::models::{FeedCursor, FeedFilter, MessageRow};
    use crate::queries::fixtures;
    use crate::{Database, now};

    fn post(
        db: &Database,
        member: &Member,
        channel: Uuid,
        parent: Option<Uuid>,
        age_secs: i64,
    ) -> MessageRow {
        let row = MessageRow {
            id: Uuid::new_v4(),
            workspace_id: member.workspace_id,
            member_id: member.id,
            body: format!("{{\"age\":{}}}", age_secs),
            image: None,
            channel_id: Some(channel),
            conversation_id: None,
            parent_message_id: parent,
            created_at: now() - Duration::seconds(age_secs),
            updated_at: None,
        };
        db.insert_message(&row).unwrap();
        row
    }

    #[test]
    fn pages_walk_newest_first_without_overlap() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let (_, admin, general) = fixtures::workspace(&db, owner);

        let posted: Vec<MessageRow> = (0..5)
            .map(|i| post(&db, &admin, general.id, None, 50 - i * 10))
            .collect();
        let filter = FeedFilter {
            channel_id: Some(general.id),
            conversation_id: None,
            parent_message_id: None,
        };

        let first = db.list_messages(&filter, None, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].message.id, posted[4].id);
        assert_eq!(first[1].message.id, posted[3].id);
        assert_eq!(first[0].user.name, "owner");

        let last = &first[1].message;
        let cursor = FeedCursor {
            created_at: last.created_at,
            id: last.id,
        };
        let rest = db.list_messages(&filter, Some(cursor), 10).unwrap();
        let ids: Vec<Uuid> = rest.iter().map(|m| m.message.id).collect();
        assert_eq!(ids, vec![posted[2].id, posted[1].id, posted[0].id]);
    }

    #[test]
    fn thread_replies_are_kept_out_of_the_channel_feed() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let guest = fixtures::user(&db, "guest");
        let (workspace, admin, general) = fixtures::workspace(&db, owner);
        let member = fixtures::member(&db, workspace.id, guest);

        let root = post(&db, &admin, general.id, None, 30);
        post(&db, &admin, general.id, Some(root.id), 20);
        let latest = post(&db, &member, general.id, Some(root.id), 10);

        let channel_feed = FeedFilter {
            channel_id: Some(general.id),
            conversation_id: None,
            parent_message_id: None,
        };
        assert_eq!(db.list_messages(&channel_feed, None, 10).unwrap().len(), 1);

        let thread_feed = FeedFilter {
            parent_message_id: Some(root.id),
            ..channel_feed
        };
        assert_eq!(db.list_messages(&thread_feed, None, 10).unwrap().len(), 2);

        let summaries = db.thread_summaries(&[root.id, latest.id]).unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[&root.id];
        assert_eq!(summary.count, 2);
        assert_eq!(summary.last_reply_name, "guest");
        assert_eq!(summary.last_reply_at, latest.created_at);
    }

    #[test]
    fn edit_then_delete_with_replies() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let (workspace, admin, general) = fixtures::workspace(&db, owner);

        let root = post(&db, &admin, general.id, None, 5);
        let reply = post(&db, &admin, general.id, Some(root.id), 1);
        db.toggle_reaction(Uuid::new_v4(), workspace.id, reply.id, admin.id, "✅").unwrap();

        let edited_at = now();
        assert!(db.update_message_body(root.id, "{\"ops\":[]}", edited_at).unwrap());
        let stored = db.get_message(root.id).unwrap().unwrap();
        assert_eq!(stored.body, "{\"ops\":[]}");
        assert_eq!(stored.updated_at, Some(edited_at));

        assert!(db.delete_message(root.id).unwrap());
        assert!(db.get_message(reply.id).unwrap().is_none());
        assert!(db.reactions_for_messages(&[reply.id]).unwrap().is_empty());
        assert!(db.get_authored_message(root.id).unwrap().is_none());
    }
}
