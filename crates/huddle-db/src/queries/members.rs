use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use huddle_types::models::{Member, Role, User};

use super::{OptionalExt, member_at, member_columns, user_at, user_columns};
use crate::{Database, format_ts};

pub(super) fn insert_member(conn: &Connection, member: &Member) -> Result<()> {
    conn.execute(
        "INSERT INTO members (id, workspace_id, user_id, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            member.id.to_string(),
            member.workspace_id.to_string(),
            member.user_id.to_string(),
            member.role.as_str(),
            format_ts(&member.created_at),
        ),
    )?;
    Ok(())
}

impl Database {
    /// Fails with a constraint violation when the user already belongs to
    /// the workspace.
    pub fn insert_member(&self, member: &Member) -> Result<()> {
        self.with_conn(|conn| insert_member(conn, member))
    }

    pub fn get_member(&self, id: Uuid) -> Result<Option<Member>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM members m WHERE m.id = ?1", member_columns("m")),
                [id.to_string()],
                |row| member_at(row, 0),
            )
            .optional()
        })
    }

    /// The membership of `user_id` in `workspace_id`, if any. This is the
    /// lookup every authorization check starts from.
    pub fn get_member_by_user(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Member>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM members m WHERE m.workspace_id = ?1 AND m.user_id = ?2",
                    member_columns("m")
                ),
                (workspace_id.to_string(), user_id.to_string()),
                |row| member_at(row, 0),
            )
            .optional()
        })
    }

    pub fn get_member_with_user(&self, id: Uuid) -> Result<Option<(Member, User)>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {}, {} FROM members m JOIN users u ON u.id = m.user_id WHERE m.id = ?1",
                    member_columns("m"),
                    user_columns("u")
                ),
                [id.to_string()],
                |row| Ok((member_at(row, 0)?, user_at(row, 5)?)),
            )
            .optional()
        })
    }

    pub fn list_members_with_users(&self, workspace_id: Uuid) -> Result<Vec<(Member, User)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, {} FROM members m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.workspace_id = ?1
                 ORDER BY m.created_at, m.id",
                member_columns("m"),
                user_columns("u")
            ))?;
            let rows = stmt
                .query_map([workspace_id.to_string()], |row| {
                    Ok((member_at(row, 0)?, user_at(row, 5)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_member_role(&self, id: Uuid, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE members SET role = ?1 WHERE id = ?2",
                (role.as_str(), id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    /// Removes a member with its reactions, its messages, its conversations
    /// (including every message in them) and replies to any removed message.
    pub fn delete_member(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        self.with_tx(|tx| {
            tx.execute_batch(
                "CREATE TEMP TABLE IF NOT EXISTS doomed_messages (id TEXT PRIMARY KEY);
                 DELETE FROM doomed_messages;",
            )?;

            // The member's own messages and everything in their conversations
            tx.execute(
                "INSERT OR IGNORE INTO doomed_messages (id)
                 SELECT id FROM messages
                 WHERE member_id = ?1
                    OR conversation_id IN (
                        SELECT id FROM conversations WHERE member_one_id = ?1 OR member_two_id = ?1
                    )",
                [&id],
            )?;
            // Replies by others to those messages
            tx.execute(
                "INSERT OR IGNORE INTO doomed_messages (id)
                 SELECT id FROM messages WHERE parent_message_id IN (SELECT id FROM doomed_messages)",
                [],
            )?;

            let reactions = tx.execute(
                "DELETE FROM reactions
                 WHERE member_id = ?1 OR message_id IN (SELECT id FROM doomed_messages)",
                [&id],
            )?;
            let messages = tx.execute(
                "DELETE FROM messages WHERE id IN (SELECT id FROM doomed_messages)",
                [],
            )?;
            let conversations = tx.execute(
                "DELETE FROM conversations WHERE member_one_id = ?1 OR member_two_id = ?1",
                [&id],
            )?;
            let n = tx.execute("DELETE FROM members WHERE id = ?1", [&id])?;
            tx.execute("DELETE FROM doomed_messages", [])?;

            debug!(
                "Member {} removed with {} messages, {} reactions, {} conversations",
                id, messages, reactions, conversations
            );
            Ok(n > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use huddle_types::models::Role;
    use uuid::Uuid;

    use crate::models::FeedFilter;
    use crate::queries::fixtures::{self, message};
    use crate::{Database, is_constraint_violation, now};

    #[test]
    fn membership_is_unique_per_user() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let (workspace, _, _) = fixtures::workspace(&db, owner);

        let err = db
            .insert_member(&huddle_types::models::Member {
                id: Uuid::new_v4(),
                workspace_id: workspace.id,
                user_id: owner,
                role: Role::Member,
                created_at: now(),
            })
            .unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn role_update_and_listing() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let guest = fixtures::user(&db, "guest");
        let (workspace, admin, _) = fixtures::workspace(&db, owner);
        let member = fixtures::member(&db, workspace.id, guest);

        assert!(db.update_member_role(member.id, Role::Admin).unwrap());
        let listed = db.list_members_with_users(workspace.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0.id, admin.id);
        assert_eq!(listed[1].0.role, Role::Admin);
        assert_eq!(listed[1].1.name, "guest");

        let (found, user) = db.get_member_with_user(member.id).unwrap().unwrap();
        assert_eq!(found.id, member.id);
        assert_eq!(user.id, guest);
    }

    #[test]
    fn removing_member_cleans_up_their_content() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let guest = fixtures::user(&db, "guest");
        let (workspace, admin, general) = fixtures::workspace(&db, owner);
        let member = fixtures::member(&db, workspace.id, guest);

        let root = message(&member, Some(general.id), None, None);
        db.insert_message(&root).unwrap();
        let reply = message(&admin, Some(general.id), None, Some(root.id));
        db.insert_message(&reply).unwrap();
        let kept = message(&admin, Some(general.id), None, None);
        db.insert_message(&kept).unwrap();
        db.toggle_reaction(Uuid::new_v4(), workspace.id, kept.id, member.id, "👍").unwrap();
        db.toggle_reaction(Uuid::new_v4(), workspace.id, kept.id, admin.id, "🎉").unwrap();

        let (conversation, _) = db
            .create_or_get_conversation(Uuid::new_v4(), workspace.id, admin.id, member.id, now())
            .unwrap();
        let dm = message(&admin, None, Some(conversation.id), None);
        db.insert_message(&dm).unwrap();

        assert!(db.delete_member(member.id).unwrap());
        assert!(db.get_member(member.id).unwrap().is_none());
        assert!(db.get_message(root.id).unwrap().is_none());
        assert!(db.get_message(reply.id).unwrap().is_none());
        assert!(db.get_message(dm.id).unwrap().is_none());
        assert!(db.get_conversation(conversation.id).unwrap().is_none());
        assert!(db.get_message(kept.id).unwrap().is_some());

        let reactions = db.reactions_for_messages(&[kept.id]).unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].member_id, admin.id);

        let feed = FeedFilter {
            channel_id: Some(general.id),
            conversation_id: None,
            parent_message_id: None,
        };
        assert_eq!(db.list_messages(&feed, None, 10).unwrap().len(), 1);
    }
}
