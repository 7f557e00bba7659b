use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::debug;
use uuid::Uuid;

use huddle_types::models::{Channel, Member, Workspace};

use super::{OptionalExt, ts_at, uuid_at};
use crate::{Database, format_ts};

const WORKSPACE_COLUMNS: &str = "w.id, w.name, w.user_id, w.join_code, w.created_at";

fn workspace_at(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        user_id: uuid_at(row, 2)?,
        join_code: row.get(3)?,
        created_at: ts_at(row, 4)?,
    })
}

impl Database {
    /// Inserts a workspace together with its first (admin) member and its
    /// default channel, atomically.
    pub fn create_workspace(
        &self,
        workspace: &Workspace,
        admin: &Member,
        general: &Channel,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO workspaces (id, name, user_id, join_code, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    workspace.id.to_string(),
                    &workspace.name,
                    workspace.user_id.to_string(),
                    &workspace.join_code,
                    format_ts(&workspace.created_at),
                ),
            )?;
            super::members::insert_member(tx, admin)?;
            super::channels::insert_channel(tx, general)?;
            Ok(())
        })
    }

    pub fn get_workspace(&self, id: Uuid) -> Result<Option<Workspace>> {
        self.with_conn(|conn| query_workspace(conn, id))
    }

    /// Workspaces the user is a member of, oldest membership first.
    pub fn list_workspaces_for_user(&self, user_id: Uuid) -> Result<Vec<Workspace>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM workspaces w
                 JOIN members m ON m.workspace_id = w.id
                 WHERE m.user_id = ?1
                 ORDER BY m.created_at, w.id",
                WORKSPACE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], workspace_at)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_workspace_name(&self, id: Uuid, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE workspaces SET name = ?1 WHERE id = ?2",
                (name, id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_join_code(&self, id: Uuid, join_code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE workspaces SET join_code = ?1 WHERE id = ?2",
                (join_code, id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    /// Removes a workspace and every row that depends on it. Dependent rows
    /// go first so foreign keys hold at every step.
    pub fn delete_workspace(&self, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        self.with_tx(|tx| {
            let reactions = tx.execute("DELETE FROM reactions WHERE workspace_id = ?1", [&id])?;
            let messages = tx.execute("DELETE FROM messages WHERE workspace_id = ?1", [&id])?;
            let conversations =
                tx.execute("DELETE FROM conversations WHERE workspace_id = ?1", [&id])?;
            let channels = tx.execute("DELETE FROM channels WHERE workspace_id = ?1", [&id])?;
            let members = tx.execute("DELETE FROM members WHERE workspace_id = ?1", [&id])?;
            let n = tx.execute("DELETE FROM workspaces WHERE id = ?1", [&id])?;

            debug!(
                "Workspace {} removed with {} members, {} channels, {} conversations, {} messages, {} reactions",
                id, members, channels, conversations, messages, reactions
            );
            Ok(n > 0)
        })
    }
}

fn query_workspace(conn: &Connection, id: Uuid) -> Result<Option<Workspace>> {
    conn.query_row(
        &format!("SELECT {} FROM workspaces w WHERE w.id = ?1", WORKSPACE_COLUMNS),
        [id.to_string()],
        workspace_at,
    )
    .optional()
}
