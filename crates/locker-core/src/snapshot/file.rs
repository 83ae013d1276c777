use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use super::traits::SnapshotStore;
use super::{Snapshot, SNAPSHOT_VERSION};
use crate::error::LockerError;

/// JSON snapshot file on local disk.
///
/// Saves go to `{file}.tmp` first and are renamed over `{file}`, so the
/// snapshot on disk is always either the old or the new state.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
    temp_path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a new FileSnapshotStore writing to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let temp_path = match path.file_name() {
            Some(name) => {
                let mut temp_name = OsString::from(name);
                temp_name.push(".tmp");
                path.with_file_name(temp_name)
            }
            None => path.with_extension("tmp"),
        };
        Self { path, temp_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the directory holding the snapshot exists.
    async fn ensure_parent_dir(&self) -> Result<(), LockerError> {
        let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        fs::create_dir_all(dir).await.map_err(|e| {
            LockerError::Persistence(format!(
                "Failed to create snapshot dir {}: {}",
                dir.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    fn store_type(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self), level = "debug")]
    async fn load(&self) -> Result<Option<Snapshot>, LockerError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LockerError::Persistence(format!(
                    "Failed to read snapshot {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&content).map_err(|e| {
            LockerError::Serialization(format!(
                "Failed to parse snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(LockerError::Serialization(format!(
                "Snapshot {} has unsupported version {}",
                self.path.display(),
                snapshot.version
            )));
        }

        debug!("Read snapshot {} with {} lock(s)", self.path.display(), snapshot.locks.len());
        Ok(Some(snapshot))
    }

    #[instrument(skip(self, snapshot), level = "debug")]
    async fn save(&self, snapshot: &Snapshot) -> Result<(), LockerError> {
        self.ensure_parent_dir().await?;

        let content = serde_json::to_vec_pretty(snapshot).map_err(|e| {
            LockerError::Serialization(format!("Failed to serialize snapshot: {}", e))
        })?;

        let mut file = fs::File::create(&self.temp_path).await.map_err(|e| {
            LockerError::Persistence(format!("Failed to create snapshot temp file: {}", e))
        })?;
        file.write_all(&content).await.map_err(|e| {
            LockerError::Persistence(format!("Failed to write snapshot temp file: {}", e))
        })?;
        file.sync_all().await.map_err(|e| {
            LockerError::Persistence(format!("Failed to flush snapshot temp file: {}", e))
        })?;
        drop(file);

        fs::rename(&self.temp_path, &self.path).await.map_err(|e| {
            LockerError::Persistence(format!("Failed to rename snapshot file: {}", e))
        })?;

        debug!("Wrote snapshot {} with {} lock(s)", self.path.display(), snapshot.locks.len());
        Ok(())
    }
}
