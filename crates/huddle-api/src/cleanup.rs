use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use huddle_db::Database;

use crate::storage::Storage;

/// Background task that prunes uploads no message ever referenced.
///
/// An image is uploaded before the message that carries it is created, so a
/// failed send leaves an orphan. Objects older than `retention` with no
/// referencing message are removed from disk and from the DB.
pub async fn run_cleanup_loop(
    db: Arc<Database>,
    storage: Arc<Storage>,
    interval: Duration,
    retention: chrono::Duration,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        match cleanup_orphans(&db, &storage, retention).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} orphaned uploads", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

pub async fn cleanup_orphans(
    db: &Arc<Database>,
    storage: &Storage,
    retention: chrono::Duration,
) -> anyhow::Result<usize> {
    let cutoff = huddle_db::now() - retention;

    let orphans = {
        let db = db.clone();
        tokio::task::spawn_blocking(move || db.orphaned_storage_objects(cutoff)).await??
    };

    let mut count = 0;
    for id in orphans {
        let deleted = {
            let db = db.clone();
            tokio::task::spawn_blocking(move || db.delete_storage_object(id)).await??
        };
        // A message may have claimed the object since the scan
        if deleted {
            storage.delete_file(id).await.ok();
            count += 1;
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_db::models::StorageObjectRow;
    use uuid::Uuid;

    #[tokio::test]
    async fn prunes_only_old_orphans() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dir = std::env::temp_dir().join(format!("huddle-cleanup-{}", Uuid::new_v4()));
        let storage = Storage::new(dir.clone()).await.unwrap();

        let uploader = Uuid::new_v4();
        db.create_user(uploader, "Ada", "ada@example.com", "x", huddle_db::now())
            .unwrap();

        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        for (id, age) in [(old, chrono::Duration::hours(48)), (fresh, chrono::Duration::zero())] {
            storage.write(id, b"img").await.unwrap();
            db.insert_storage_object(&StorageObjectRow {
                id,
                uploader_id: uploader,
                content_type: "image/png".into(),
                size: 3,
                sha256: String::new(),
                created_at: huddle_db::now() - age,
            })
            .unwrap();
        }

        let n = cleanup_orphans(&db, &storage, chrono::Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(db.get_storage_object(old).unwrap().is_none());
        assert!(storage.open(old).await.unwrap().is_none());
        assert!(db.get_storage_object(fresh).unwrap().is_some());

        let _ = std::fs::remove_dir_all(dir);
    }
}
