//! Attachment registry and manifest port.
//!
//! Tracks user-supplied files through their upload lifecycle. Only `Ready`
//! entries are persisted to the manifest or referenced in outgoing
//! requests. An upload failure marks the entry `Error` and leaves the
//! conversation untouched; the user can retry or remove it.

use std::sync::Arc;

use tether_types::attachment::ManagedAttachment;
use tether_types::error::PersistenceError;
use tether_types::gateway::FilePurpose;
use tracing::{info, warn};

use crate::gateway::InterlocutorGateway;

/// Durable store for the `Ready` attachment manifest, keyed by
/// conversation identity. Implementations live in tether-infra.
pub trait AttachmentManifestStore: Send + Sync {
    /// Load the manifest; empty when none exists.
    fn load(
        &self,
        identity: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ManagedAttachment>, PersistenceError>> + Send;

    /// Replace the manifest with the given entries (Ready subset only).
    fn store(
        &self,
        identity: &str,
        attachments: &[ManagedAttachment],
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}

/// Lifecycle tracker for files referenced by upcoming turns.
pub struct AttachmentRegistry<G, S> {
    gateway: Arc<G>,
    store: S,
    entries: Vec<ManagedAttachment>,
}

impl<G: InterlocutorGateway, S: AttachmentManifestStore> AttachmentRegistry<G, S> {
    pub fn new(gateway: Arc<G>, store: S) -> Self {
        Self {
            gateway,
            store,
            entries: Vec::new(),
        }
    }

    /// Load the persisted manifest for an identity. Loaded entries are
    /// Ready by definition -- anything else was never written.
    pub async fn load(&mut self, identity: &str) -> Result<(), PersistenceError> {
        let mut entries = self.store.load(identity).await?;
        for entry in &mut entries {
            entry.mark_ready(entry.file_id.clone());
        }
        self.entries = entries;
        Ok(())
    }

    /// Upload a file and track it. The entry is visible as `Uploading`
    /// immediately; on success it turns `Ready` and the manifest is
    /// re-persisted, on failure it turns `Error` and nothing is written.
    ///
    /// Returns the entry index.
    pub async fn upload(
        &mut self,
        identity: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<usize, PersistenceError> {
        let index = self.entries.len();
        self.entries.push(ManagedAttachment::uploading(name));

        match self
            .gateway
            .upload_file(name, bytes, FilePurpose::Attachment)
            .await
        {
            Ok(uploaded) => {
                self.entries[index].mark_ready(uploaded.id);
                info!(name, "attachment uploaded");
                self.persist(identity).await?;
            }
            Err(e) => {
                self.entries[index].mark_error();
                warn!(name, "attachment upload failed: {e}");
            }
        }
        Ok(index)
    }

    /// Remove an entry. The remote delete is best-effort: the local entry
    /// goes away and the manifest is re-persisted regardless of the remote
    /// outcome.
    pub async fn delete(&mut self, identity: &str, index: usize) -> Result<(), PersistenceError> {
        if index >= self.entries.len() {
            return Ok(());
        }
        let entry = self.entries.remove(index);
        if !entry.file_id.is_empty() {
            match self.gateway.delete_file(&entry.file_id).await {
                Ok(confirmed) => info!(file_id = %entry.file_id, confirmed, "remote file deleted"),
                Err(e) => warn!(file_id = %entry.file_id, "remote delete failed: {e}"),
            }
        }
        self.persist(identity).await
    }

    /// Remote ids of entries eligible for outgoing requests.
    pub fn ready_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|a| a.is_ready())
            .map(|a| a.file_id.clone())
            .collect()
    }

    pub fn entries(&self) -> &[ManagedAttachment] {
        &self.entries
    }

    /// Drop all entries, on conversation switch.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    async fn persist(&self, identity: &str) -> Result<(), PersistenceError> {
        let ready: Vec<ManagedAttachment> = self
            .entries
            .iter()
            .filter(|a| a.is_ready())
            .cloned()
            .collect();
        self.store.store(identity, &ready).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::scripted::ScriptedGateway;
    use crate::testutil::MemoryManifestStore;
    use tether_types::attachment::AttachmentStatus;
    use tether_types::gateway::GatewayError;

    fn registry() -> (Arc<ScriptedGateway>, AttachmentRegistry<ScriptedGateway, MemoryManifestStore>)
    {
        let gateway = Arc::new(ScriptedGateway::new());
        let registry = AttachmentRegistry::new(Arc::clone(&gateway), MemoryManifestStore::default());
        (gateway, registry)
    }

    #[tokio::test]
    async fn test_upload_success_becomes_ready_and_persists() {
        let (gateway, mut reg) = registry();
        gateway.push_upload(Ok("file-1".into()));

        let idx = reg.upload("chat", "doc.txt", b"data".to_vec()).await.unwrap();
        assert!(reg.entries()[idx].is_ready());
        assert_eq!(reg.ready_ids(), vec!["file-1"]);

        let persisted = reg.store.load("chat").await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].file_id, "file-1");
    }

    #[tokio::test]
    async fn test_upload_failure_marks_error_and_persists_nothing() {
        let (gateway, mut reg) = registry();
        gateway.push_upload(Err(GatewayError::UploadFailed("quota".into())));

        let idx = reg.upload("chat", "big.bin", vec![0; 8]).await.unwrap();
        assert_eq!(reg.entries()[idx].status, AttachmentStatus::Error);
        assert!(reg.ready_ids().is_empty());
        assert!(reg.store.load("chat").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_best_effort() {
        let (gateway, mut reg) = registry();
        gateway.push_upload(Ok("file-1".into()));
        reg.upload("chat", "doc.txt", b"x".to_vec()).await.unwrap();

        gateway.push_delete(Err(GatewayError::Transport("down".into())));
        reg.delete("chat", 0).await.unwrap();

        // Local entry removed and manifest rewritten despite the remote
        // failure.
        assert!(reg.entries().is_empty());
        assert!(reg.store.load("chat").await.unwrap().is_empty());
        assert_eq!(gateway.deleted_ids(), vec!["file-1"]);
    }

    #[tokio::test]
    async fn test_delete_out_of_range_is_noop() {
        let (_gateway, mut reg) = registry();
        reg.delete("chat", 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_marks_entries_ready() {
        let (gateway, mut reg) = registry();
        gateway.push_upload(Ok("file-9".into()));
        reg.upload("chat", "doc.txt", b"x".to_vec()).await.unwrap();

        let mut other = AttachmentRegistry::new(gateway, reg.store.clone());
        other.load("chat").await.unwrap();
        assert_eq!(other.ready_ids(), vec!["file-9"]);
    }
}
