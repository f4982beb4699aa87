//! In-memory implementations of the persistence ports for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tether_types::attachment::ManagedAttachment;
use tether_types::error::PersistenceError;
use tether_types::message::Message;

use crate::attachment::AttachmentManifestStore;
use crate::log::ConversationLog;
use crate::memory::LongTermMemoryStore;

/// In-memory `ConversationLog` keyed by identity.
#[derive(Default, Clone)]
pub(crate) struct MemoryLog {
    records: Arc<Mutex<HashMap<String, Vec<Message>>>>,
}

impl MemoryLog {
    pub(crate) fn records(&self, identity: &str) -> Vec<Message> {
        self.records
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn seed(&self, identity: &str, messages: Vec<Message>) {
        self.records
            .lock()
            .unwrap()
            .insert(identity.to_string(), messages);
    }
}

impl ConversationLog for MemoryLog {
    async fn append(&self, identity: &str, message: &Message) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .unwrap()
            .entry(identity.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn load(&self, identity: &str) -> Result<Vec<Message>, PersistenceError> {
        Ok(self.records(identity))
    }

    async fn rewrite(&self, identity: &str, messages: &[Message]) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .unwrap()
            .insert(identity.to_string(), messages.to_vec());
        Ok(())
    }

    async fn clear(&self, identity: &str) -> Result<(), PersistenceError> {
        self.records.lock().unwrap().remove(identity);
        Ok(())
    }
}

/// In-memory `LongTermMemoryStore` with backup history.
#[derive(Default, Clone)]
pub(crate) struct MemoryLtmStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
    backups: Arc<Mutex<Vec<String>>>,
}

impl MemoryLtmStore {
    pub(crate) fn blob(&self, identity: &str) -> String {
        self.blobs
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn seed(&self, identity: &str, blob: &str) {
        self.blobs
            .lock()
            .unwrap()
            .insert(identity.to_string(), blob.to_string());
    }

    pub(crate) fn backups(&self) -> Vec<String> {
        self.backups.lock().unwrap().clone()
    }
}

impl LongTermMemoryStore for MemoryLtmStore {
    async fn load(&self, identity: &str) -> Result<String, PersistenceError> {
        Ok(self.blob(identity))
    }

    async fn store(&self, identity: &str, text: &str) -> Result<(), PersistenceError> {
        let mut blobs = self.blobs.lock().unwrap();
        if let Some(previous) = blobs.get(identity) {
            self.backups.lock().unwrap().push(previous.clone());
        }
        blobs.insert(identity.to_string(), text.to_string());
        Ok(())
    }
}

/// In-memory `AttachmentManifestStore`.
#[derive(Default, Clone)]
pub(crate) struct MemoryManifestStore {
    manifests: Arc<Mutex<HashMap<String, Vec<ManagedAttachment>>>>,
}

impl AttachmentManifestStore for MemoryManifestStore {
    async fn load(&self, identity: &str) -> Result<Vec<ManagedAttachment>, PersistenceError> {
        Ok(self
            .manifests
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .unwrap_or_default())
    }

    async fn store(
        &self,
        identity: &str,
        attachments: &[ManagedAttachment],
    ) -> Result<(), PersistenceError> {
        self.manifests
            .lock()
            .unwrap()
            .insert(identity.to_string(), attachments.to_vec());
        Ok(())
    }
}
