//! Managed attachment lifecycle types.
//!
//! A user-supplied file moves through Uploading -> Ready (or Error) before
//! it can be referenced by an outgoing request. Only Ready entries are ever
//! persisted; the on-disk manifest shape is `{fileName, fileId}`.

use serde::{Deserialize, Serialize};

/// Upload lifecycle state of a managed attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachmentStatus {
    #[default]
    Uploading,
    Ready,
    Error,
}

/// A user-supplied file tracked through its upload lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedAttachment {
    #[serde(rename = "fileName")]
    pub file_name: String,
    /// Remote identifier; empty until the upload completes.
    #[serde(rename = "fileId", default)]
    pub file_id: String,
    /// Not persisted: manifest entries are Ready by definition.
    #[serde(skip)]
    pub status: AttachmentStatus,
}

impl ManagedAttachment {
    /// A fresh entry for a file whose upload has just been issued.
    pub fn uploading(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_id: String::new(),
            status: AttachmentStatus::Uploading,
        }
    }

    /// Whether this attachment may be referenced in an outgoing request.
    pub fn is_ready(&self) -> bool {
        self.status == AttachmentStatus::Ready
    }

    /// Mark the upload complete with its remote id.
    pub fn mark_ready(&mut self, file_id: impl Into<String>) {
        self.file_id = file_id.into();
        self.status = AttachmentStatus::Ready;
    }

    /// Mark the upload failed. The entry stays visible so the user can
    /// retry or remove it.
    pub fn mark_error(&mut self) {
        self.status = AttachmentStatus::Error;
    }
}
