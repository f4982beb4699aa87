//! Attachment manifest store.
//!
//! A JSON array of `{fileName, fileId}` objects per conversation identity,
//! holding only `Ready` attachments. A manifest that fails to parse is
//! treated as empty with a diagnostic rather than blocking the
//! conversation from loading.

use std::path::PathBuf;

use tether_core::attachment::AttachmentManifestStore;
use tether_types::attachment::ManagedAttachment;
use tether_types::error::PersistenceError;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Filesystem store for the Ready-attachment manifest.
pub struct JsonManifestStore {
    dir: PathBuf,
}

impl JsonManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the manifest file for an identity.
    pub fn path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{identity}.attachments.json"))
    }
}

impl AttachmentManifestStore for JsonManifestStore {
    async fn load(&self, identity: &str) -> Result<Vec<ManagedAttachment>, PersistenceError> {
        let path = self.path(identity);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %path.display(), "ignoring malformed attachment manifest: {e}");
                Ok(Vec::new())
            }
        }
    }

    async fn store(
        &self,
        identity: &str,
        attachments: &[ManagedAttachment],
    ) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(attachments)
            .map_err(|e| PersistenceError::Io(e.to_string()))?;
        let path = self.path(identity);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| PersistenceError::Rename(e.to_string()))
    }
}
