//! Deterministic in-process gateway.
//!
//! `ScriptedGateway` answers without any network: outcomes can be queued
//! ahead of time, and when the queue is empty it falls back to echoing the
//! last user message reversed with simulated usage numbers. Every request
//! is recorded so tests can assert on what was sent. This is the debug
//! backend the engine is developed and tested against.

use std::collections::VecDeque;
use std::sync::Mutex;

use tether_types::gateway::{
    FilePurpose, GatewayError, GatewayReply, RequestKind, TurnRequest, UploadedFile,
};
use tether_types::message::MessageRole;

use crate::gateway::InterlocutorGateway;

/// A pre-queued reply body for `send_request`.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub is_incomplete: bool,
}

impl ScriptedReply {
    pub fn complete(text: impl Into<String>, input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            text: text.into(),
            input_tokens,
            output_tokens,
            is_incomplete: false,
        }
    }

    pub fn incomplete(text: impl Into<String>, input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            text: text.into(),
            input_tokens,
            output_tokens,
            is_incomplete: true,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<ScriptedReply, GatewayError>>,
    uploads: VecDeque<Result<String, GatewayError>>,
    deletes: VecDeque<Result<bool, GatewayError>>,
    sent: Vec<TurnRequest>,
    uploaded_names: Vec<String>,
    deleted_ids: Vec<String>,
}

/// Scriptable in-process backend implementing the gateway contract.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `send_request` outcome.
    pub fn push_reply(&self, reply: ScriptedReply) {
        self.lock().replies.push_back(Ok(reply));
    }

    /// Queue the next `send_request` failure.
    pub fn push_error(&self, error: GatewayError) {
        self.lock().replies.push_back(Err(error));
    }

    /// Queue the next `upload_file` outcome.
    pub fn push_upload(&self, outcome: Result<String, GatewayError>) {
        self.lock().uploads.push_back(outcome);
    }

    /// Queue the next `delete_file` outcome.
    pub fn push_delete(&self, outcome: Result<bool, GatewayError>) {
        self.lock().deletes.push_back(outcome);
    }

    /// Every request sent so far, in issuance order.
    pub fn sent_requests(&self) -> Vec<TurnRequest> {
        self.lock().sent.clone()
    }

    /// Requests sent so far with the given kind.
    pub fn sent_count(&self, kind: RequestKind) -> usize {
        self.lock().sent.iter().filter(|r| r.kind == kind).count()
    }

    /// File names passed to `upload_file`, in order.
    pub fn uploaded_names(&self) -> Vec<String> {
        self.lock().uploaded_names.clone()
    }

    /// Remote ids passed to `delete_file`, in order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.lock().deleted_ids.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // Single logical thread; a poisoned lock means a test already
        // panicked and the run is over anyway.
        self.script.lock().expect("scripted gateway lock poisoned")
    }

    fn fallback_reply(request: &TurnRequest) -> ScriptedReply {
        let last_user = request
            .history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.text.as_str())
            .unwrap_or_default();
        let reversed: String = last_user.chars().rev().collect();
        let input_tokens: u32 = request.history.iter().map(|m| m.heuristic_cost()).sum();
        let output_tokens = (reversed.len() as u32) / 4 + 1;
        ScriptedReply::complete(format!("echo: {reversed}"), input_tokens, output_tokens)
    }
}

impl InterlocutorGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send_request(&self, request: TurnRequest) -> Result<GatewayReply, GatewayError> {
        let (id, kind) = (request.id, request.kind);
        let outcome = {
            let mut script = self.lock();
            let queued = script.replies.pop_front();
            script.sent.push(request.clone());
            queued.unwrap_or_else(|| Ok(Self::fallback_reply(&request)))
        };
        // Yield once so completion is observably asynchronous.
        tokio::task::yield_now().await;
        outcome.map(|r| GatewayReply {
            request_id: id,
            kind,
            total_tokens: r.input_tokens + r.output_tokens,
            text: r.text,
            input_tokens: r.input_tokens,
            output_tokens: r.output_tokens,
            is_incomplete: r.is_incomplete,
        })
    }

    async fn upload_file(
        &self,
        name: &str,
        _bytes: Vec<u8>,
        purpose: FilePurpose,
    ) -> Result<UploadedFile, GatewayError> {
        let outcome = {
            let mut script = self.lock();
            script.uploaded_names.push(name.to_string());
            script.uploads.pop_front()
        };
        tokio::task::yield_now().await;
        match outcome {
            Some(Ok(id)) => Ok(UploadedFile { id, purpose }),
            Some(Err(e)) => Err(e),
            None => Ok(UploadedFile {
                id: format!("scripted-file-{name}"),
                purpose,
            }),
        }
    }

    async fn delete_file(&self, id: &str) -> Result<bool, GatewayError> {
        let outcome = {
            let mut script = self.lock();
            script.deleted_ids.push(id.to_string());
            script.deletes.pop_front()
        };
        tokio::task::yield_now().await;
        outcome.unwrap_or(Ok(true))
    }
}
