//! Gateway request/reply types.
//!
//! These are the canonical shapes every interlocutor backend consumes and
//! produces. Vendor-specific wire translation happens behind the
//! `InterlocutorGateway` trait in tether-core; nothing here knows about HTTP
//! or any provider's JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::message::Message;

/// Routing tag attached to a request and echoed unchanged in its reply.
///
/// A normal chat turn and a compaction turn can complete out of issuance
/// order; the tag, not arrival order, decides which logic handles a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    NormalMessage,
    CurationResult,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::NormalMessage => write!(f, "normal_message"),
            RequestKind::CurationResult => write!(f, "curation_result"),
        }
    }
}

/// One uniform request to an interlocutor backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Time-sortable id pairing this request with its eventual reply.
    pub id: Uuid,
    pub kind: RequestKind,
    /// Ordered working set to resend, oldest first.
    pub history: Vec<Message>,
    /// Current long-term memory blob, empty if none exists yet.
    pub long_term_memory: String,
    /// Remote ids of Ready attachments to reference.
    pub attachment_ids: Vec<String>,
}

impl TurnRequest {
    pub fn new(
        kind: RequestKind,
        history: Vec<Message>,
        long_term_memory: String,
        attachment_ids: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            history,
            long_term_memory,
            attachment_ids,
        }
    }
}

/// Canonical reply shape from any backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReply {
    /// Echo of the originating request id.
    pub request_id: Uuid,
    /// Echo of the originating request kind, unchanged.
    pub kind: RequestKind,
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    /// True when the backend truncated its answer and expects a follow-up
    /// turn to continue it.
    pub is_incomplete: bool,
}

/// Why an uploaded file exists on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Attachment,
}

/// Result of a successful remote file upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub purpose: FilePurpose,
}

/// Errors from gateway operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
