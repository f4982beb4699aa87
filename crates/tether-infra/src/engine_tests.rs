//! End-to-end tests: the conversation controller wired to the real
//! filesystem adapters, driven through a scripted gateway.

use std::sync::Arc;

use tempfile::TempDir;
use tether_core::controller::ConversationController;
use tether_core::curation::CurationState;
use tether_core::gateway::scripted::{ScriptedGateway, ScriptedReply};
use tether_types::curation::CurationThresholds;
use tether_types::message::MessageRole;

use crate::filesystem::{FileLongTermMemoryStore, JsonManifestStore, JsonlConversationLog};

type FsController = ConversationController<
    ScriptedGateway,
    JsonlConversationLog,
    FileLongTermMemoryStore,
    JsonManifestStore,
>;

struct Harness {
    dir: TempDir,
    gateway: Arc<ScriptedGateway>,
    controller: FsController,
}

fn harness(trigger: u32, target: u32) -> Harness {
    let dir = TempDir::new().unwrap();
    let gateway = Arc::new(ScriptedGateway::new());
    let controller = ConversationController::new(
        Arc::clone(&gateway),
        JsonlConversationLog::new(dir.path()),
        FileLongTermMemoryStore::new(dir.path()),
        JsonManifestStore::new(dir.path()),
        CurationThresholds::new(trigger, target).unwrap(),
    );
    Harness {
        dir,
        gateway,
        controller,
    }
}

impl Harness {
    fn transcript_path(&self) -> std::path::PathBuf {
        self.dir.path().join("chat.jsonl")
    }

    fn memory_path(&self) -> std::path::PathBuf {
        self.dir.path().join("chat.memory.txt")
    }
}

#[tokio::test]
async fn test_turn_is_durable_on_disk() {
    let mut h = harness(120_000, 100_000);
    h.controller.load_conversation("chat").await.unwrap();
    h.gateway
        .push_reply(ScriptedReply::complete("the answer", 40, 10));

    h.controller.send_and_settle("the question").await.unwrap();

    let raw = std::fs::read_to_string(h.transcript_path()).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["role"], "user");
    assert_eq!(first["text"], "the question");
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["role"], "assistant");
    assert_eq!(second["completionTokens"], 10);
}

#[tokio::test]
async fn test_reload_restores_conversation_from_disk() {
    let mut h = harness(120_000, 100_000);
    h.controller.load_conversation("chat").await.unwrap();
    h.gateway
        .push_reply(ScriptedReply::complete("the answer", 40, 10));
    h.controller.send_and_settle("the question").await.unwrap();

    // A fresh controller over the same directory sees the same history.
    let mut second = ConversationController::new(
        Arc::new(ScriptedGateway::new()),
        JsonlConversationLog::new(h.dir.path()),
        FileLongTermMemoryStore::new(h.dir.path()),
        JsonManifestStore::new(h.dir.path()),
        CurationThresholds::default(),
    );
    second.load_conversation("chat").await.unwrap();

    let messages = second.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "the question");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert!(second.live_tokens() > 0);
}

#[tokio::test]
async fn test_reload_falls_back_to_heuristic_for_prompt_usage() {
    let mut h = harness(120_000, 100_000);
    h.controller.load_conversation("chat").await.unwrap();
    h.gateway
        .push_reply(ScriptedReply::complete("the answer", 40, 10));
    h.controller.send_and_settle("the question").await.unwrap();

    // In memory the user message carries the authoritative prompt figure.
    assert_eq!(h.controller.messages()[0].prompt_tokens, 40);
    assert_eq!(h.controller.live_tokens(), 50);

    // On disk it was appended before the reply arrived, so the record
    // still says promptTokens 0.
    let raw = std::fs::read_to_string(h.transcript_path()).unwrap();
    let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert_eq!(first["promptTokens"], 0);

    // A reload therefore costs that message by the heuristic, plus the
    // persisted completion tokens of the reply.
    let mut second = ConversationController::new(
        Arc::new(ScriptedGateway::new()),
        JsonlConversationLog::new(h.dir.path()),
        FileLongTermMemoryStore::new(h.dir.path()),
        JsonManifestStore::new(h.dir.path()),
        CurationThresholds::default(),
    );
    second.load_conversation("chat").await.unwrap();
    let user_cost = second.messages()[0].heuristic_cost();
    assert_eq!(second.live_tokens(), user_cost + 10);
}

#[tokio::test]
async fn test_curation_writes_memory_and_compacts_transcript() {
    let mut h = harness(100, 70);
    h.controller.load_conversation("chat").await.unwrap();

    h.gateway
        .push_reply(ScriptedReply::complete("long answer", 50, 60));
    h.gateway
        .push_reply(ScriptedReply::complete("merged summary", 20, 30));

    h.controller.send_and_settle("hello").await.unwrap();

    assert_eq!(h.controller.curation_state(), CurationState::Idle);
    assert_eq!(
        std::fs::read_to_string(h.memory_path()).unwrap(),
        "merged summary"
    );

    // The transcript on disk was rewritten to the retained suffix only.
    let raw = std::fs::read_to_string(h.transcript_path()).unwrap();
    assert_eq!(raw.lines().count(), h.controller.messages().len());
}

#[tokio::test]
async fn test_failed_curation_leaves_both_files_untouched() {
    let mut h = harness(100, 70);
    h.controller.load_conversation("chat").await.unwrap();

    // Establish a previous long-term memory on disk.
    h.gateway
        .push_reply(ScriptedReply::complete("answer one", 50, 60));
    h.gateway
        .push_reply(ScriptedReply::complete("first summary", 10, 20));
    h.controller.send_and_settle("question one").await.unwrap();
    assert_eq!(
        std::fs::read_to_string(h.memory_path()).unwrap(),
        "first summary"
    );

    let memory_before = std::fs::read(h.memory_path()).unwrap();
    let transcript_before = std::fs::read(h.transcript_path()).unwrap();

    // Next turn triggers curation again, but the summary is truncated.
    h.gateway
        .push_reply(ScriptedReply::complete("answer two", 60, 50));
    h.gateway
        .push_reply(ScriptedReply::incomplete("partial su", 10, 5));
    h.controller.send_and_settle("question two").await.unwrap();

    // Failure is invisible on disk: both files byte-identical, except for
    // the appended turn in the transcript.
    assert_eq!(std::fs::read(h.memory_path()).unwrap(), memory_before);
    let transcript_after = std::fs::read(h.transcript_path()).unwrap();
    assert!(transcript_after.starts_with(&transcript_before));
    assert_eq!(h.controller.long_term_memory(), "first summary");
    assert_eq!(h.controller.curation_state(), CurationState::Idle);
}

#[tokio::test]
async fn test_attachment_manifest_survives_reload() {
    let mut h = harness(120_000, 100_000);
    h.controller.load_conversation("chat").await.unwrap();
    h.gateway.push_upload(Ok("remote-1".into()));
    h.controller
        .upload_attachment("notes.txt", b"notes".to_vec())
        .await
        .unwrap();

    let mut second = ConversationController::new(
        Arc::new(ScriptedGateway::new()),
        JsonlConversationLog::new(h.dir.path()),
        FileLongTermMemoryStore::new(h.dir.path()),
        JsonManifestStore::new(h.dir.path()),
        CurationThresholds::default(),
    );
    second.load_conversation("chat").await.unwrap();

    let attachments = second.attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].file_name, "notes.txt");
    assert!(attachments[0].is_ready());
}

#[tokio::test]
async fn test_clear_conversation_removes_transcript() {
    let mut h = harness(120_000, 100_000);
    h.controller.load_conversation("chat").await.unwrap();
    h.gateway.push_reply(ScriptedReply::complete("hi", 5, 2));
    h.controller.send_and_settle("hello").await.unwrap();
    assert!(h.transcript_path().exists());

    h.controller.clear_conversation().await.unwrap();
    assert!(!h.transcript_path().exists());
    assert!(h.controller.messages().is_empty());
}
