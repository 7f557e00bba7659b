use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{OptionalExt, ts_at, uuid_at};
use crate::models::StorageObjectRow;
use crate::{Database, format_ts};

impl Database {
    pub fn insert_storage_object(&self, object: &StorageObjectRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO storage_objects (id, uploader_id, content_type, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    object.id.to_string(),
                    object.uploader_id.to_string(),
                    &object.content_type,
                    object.size,
                    &object.sha256,
                    format_ts(&object.created_at),
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_storage_object(&self, id: Uuid) -> Result<Option<StorageObjectRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, uploader_id, content_type, size, sha256, created_at
                 FROM storage_objects WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok(StorageObjectRow {
                        id: uuid_at(row, 0)?,
                        uploader_id: uuid_at(row, 1)?,
                        content_type: row.get(2)?,
                        size: row.get(3)?,
                        sha256: row.get(4)?,
                        created_at: ts_at(row, 5)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Objects created before `cutoff` that no message points at.
    pub fn orphaned_storage_objects(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id FROM storage_objects s
                 WHERE s.created_at < ?1
                   AND NOT EXISTS (SELECT 1 FROM messages m WHERE m.image = s.id)",
            )?;
            let ids = stmt
                .query_map([format_ts(&cutoff)], |row| uuid_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Deletes the row unless a message still references it.
    pub fn delete_storage_object(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM storage_objects
                 WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM messages m WHERE m.image = ?1)",
                [id.to_string()],
            )?;
            Ok(n > 0)
        })
    }
}
