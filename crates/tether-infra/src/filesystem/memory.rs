//! Long-term memory file store.
//!
//! One plain UTF-8 blob per conversation identity, replaced wholesale on a
//! successful compaction. A write never destroys the previous value: the
//! existing file is first copied to `<name>.<YYYYMMDD_HHmmss>.bak`, then
//! the new blob lands via temp file + rename.

use std::path::PathBuf;

use chrono::Local;
use tether_core::memory::LongTermMemoryStore;
use tether_types::error::PersistenceError;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Filesystem store for the compacted long-term memory.
pub struct FileLongTermMemoryStore {
    dir: PathBuf,
}

impl FileLongTermMemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the memory file for an identity.
    pub fn path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{identity}.memory.txt"))
    }

    fn backup_path(&self, identity: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.dir.join(format!("{identity}.memory.{stamp}.bak"))
    }
}

impl LongTermMemoryStore for FileLongTermMemoryStore {
    async fn load(&self, identity: &str) -> Result<String, PersistenceError> {
        match fs::read_to_string(self.path(identity)).await {
            Ok(blob) => Ok(blob),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, identity: &str, text: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path(identity);

        if fs::try_exists(&path).await? {
            let backup = self.backup_path(identity);
            fs::copy(&path, &backup).await?;
            info!(backup = %backup.display(), "backed up previous long-term memory");
        }

        let tmp = path.with_extension("txt.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(text.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| PersistenceError::Rename(e.to_string()))
    }
}
