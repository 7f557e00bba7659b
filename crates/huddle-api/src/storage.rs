use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk blob store for uploaded images.
///
/// Each object is a single flat file at `{storage_dir}/{storage_id}`. The
/// metadata row lives in `storage_objects`; this type only touches bytes.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn file_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(id.to_string())
    }

    /// Write `data` as object `id`. Returns the hex SHA-256 of the content.
    pub async fn write(&self, id: Uuid, data: &[u8]) -> Result<String> {
        let sha256 = hex::encode(Sha256::digest(data));

        let path = self.file_path(id);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(sha256)
    }

    pub async fn open(&self, id: Uuid) -> Result<Option<fs::File>> {
        match fs::File::open(self.file_path(id)).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<()> {
        match fs::remove_file(self.file_path(id)).await {
            Ok(()) => {
                info!("Deleted storage object {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Storage object {} already gone", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
