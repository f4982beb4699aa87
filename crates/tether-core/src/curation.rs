//! The curation (compaction) engine.
//!
//! When live memory reaches the trigger threshold, the engine culls the
//! oldest messages until the figure is at or under the target, asks the
//! backend to fold the culled transcript into the long-term memory, and
//! commits the result durably. The culled prefix stays staged inside the
//! engine until the summary arrives: on failure it is restored to the front
//! of the working set and both the log and the long-term memory file are
//! left untouched.

use std::mem;

use tether_types::curation::CurationThresholds;
use tether_types::error::{ConfigError, PersistenceError};
use tether_types::gateway::{RequestKind, TurnRequest};
use tether_types::message::Message;
use tracing::{debug, info, warn};

use crate::conversation::Conversation;
use crate::log::ConversationLog;
use crate::memory::LongTermMemoryStore;
use crate::tracker::LiveMemoryTracker;

/// System instructions for the compaction turn.
const COMPACTION_SYSTEM_PROMPT: &str = r#"You maintain the long-term memory of an ongoing conversation. Merge the existing long-term memory and the evicted transcript below into one updated memory document. Preserve:
1. Key decisions, conclusions and commitments
2. Important facts about the user and their goals
3. Any unresolved questions

The retained recent messages are provided only as context; do not restate them. Reply with the updated memory document and nothing else. Write in third person."#;

/// Compaction lifecycle: `Idle -> Culling -> AwaitingSummary -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurationState {
    Idle,
    Culling,
    AwaitingSummary,
}

/// Result of attempting to start a compaction pass.
#[derive(Debug)]
pub enum CullOutcome {
    /// The cull is staged; dispatch this request and route its reply back
    /// to the engine.
    Started { request: TurnRequest, culled: usize },
    /// Live memory is over the trigger but nothing was cullable.
    NothingToCull,
    /// A pass is already in flight; the trigger is ignored.
    NotIdle,
}

/// State machine that decides when to compact, culls, and commits the new
/// long-term memory durably.
#[derive(Debug)]
pub struct CurationEngine {
    thresholds: CurationThresholds,
    state: CurationState,
    /// Culled prefix held uncommitted until the summary succeeds.
    staged: Vec<Message>,
    /// Long-term memory as of the cull, kept for rollback if the commit
    /// fails partway.
    previous_memory: String,
}

impl CurationEngine {
    pub fn new(thresholds: CurationThresholds) -> Self {
        Self {
            thresholds,
            state: CurationState::Idle,
            staged: Vec::new(),
            previous_memory: String::new(),
        }
    }

    pub fn state(&self) -> CurationState {
        self.state
    }

    pub fn thresholds(&self) -> CurationThresholds {
        self.thresholds
    }

    /// Number of messages currently staged for summarization.
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Reconfigure the thresholds. An invalid pair (trigger <= target) is
    /// rejected with a warning and the previous configuration retained.
    pub fn set_thresholds(&mut self, trigger: u32, target: u32) -> Result<(), ConfigError> {
        match self.thresholds.set(trigger, target) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(trigger, target, "rejected curation thresholds: {e}");
                Err(e)
            }
        }
    }

    /// Whether a compaction pass is due.
    pub fn should_trigger(&self, live_tokens: u32) -> bool {
        self.state == CurationState::Idle && live_tokens >= self.thresholds.trigger_tokens
    }

    /// Cull the oldest messages until live memory is at or under the target
    /// (or the conversation is exhausted) and build the compaction request.
    ///
    /// The cull is staged, not committed: the log is only rewritten when
    /// the summary commits.
    #[tracing::instrument(name = "curation_begin", skip(self, conversation, tracker, long_term_memory), fields(live_tokens = tracker.live_tokens()))]
    pub fn begin(
        &mut self,
        conversation: &mut Conversation,
        tracker: &mut LiveMemoryTracker,
        long_term_memory: &str,
    ) -> CullOutcome {
        if self.state != CurationState::Idle {
            debug!(state = ?self.state, "curation trigger ignored, pass in flight");
            return CullOutcome::NotIdle;
        }
        self.state = CurationState::Culling;

        let target = self.thresholds.target_tokens;
        while tracker.live_tokens() > target {
            let Some(message) = conversation.pop_front() else {
                break;
            };
            tracker.deduct(message.token_cost());
            self.staged.push(message);
        }

        if self.staged.is_empty() {
            warn!("curation triggered but nothing to cull");
            self.state = CurationState::Idle;
            return CullOutcome::NothingToCull;
        }

        let culled = self.staged.len();
        info!(
            culled,
            live_tokens = tracker.live_tokens(),
            "culled oldest messages for compaction"
        );

        self.previous_memory = long_term_memory.to_string();
        let prompt = build_compaction_prompt(long_term_memory, &self.staged, conversation.messages());
        let request = TurnRequest::new(
            RequestKind::CurationResult,
            vec![Message::user(prompt)],
            long_term_memory.to_string(),
            Vec::new(),
        );
        self.state = CurationState::AwaitingSummary;
        CullOutcome::Started { request, culled }
    }

    /// Commit a successful summary: back up and overwrite the long-term
    /// memory, then make the cull durable by rewriting the log with the
    /// retained messages.
    ///
    /// If the log rewrite fails after the memory was already stored, the
    /// memory file is rolled back to its pre-cull value so a subsequent
    /// `abort` leaves both files as they were.
    pub async fn commit<L: ConversationLog, M: LongTermMemoryStore>(
        &mut self,
        identity: &str,
        summary: &str,
        ltm_store: &M,
        log: &L,
        conversation: &Conversation,
    ) -> Result<(), PersistenceError> {
        ltm_store.store(identity, summary).await?;
        if let Err(e) = log.rewrite(identity, &conversation.persistable()).await {
            warn!("log rewrite failed after memory store, rolling back: {e}");
            if let Err(rollback) = ltm_store.store(identity, &self.previous_memory).await {
                warn!("long-term memory rollback failed: {rollback}");
            }
            return Err(e);
        }
        info!(
            retained = conversation.len(),
            summarized = self.staged.len(),
            "compaction committed"
        );
        self.staged.clear();
        self.previous_memory.clear();
        self.state = CurationState::Idle;
        Ok(())
    }

    /// Abandon the pass: restore the staged prefix to the front of the
    /// working set and return to Idle. The previous long-term memory and
    /// the log are untouched. Returns the number of restored messages.
    pub fn abort(
        &mut self,
        conversation: &mut Conversation,
        tracker: &mut LiveMemoryTracker,
    ) -> usize {
        let restored = self.staged.len();
        if restored > 0 {
            conversation.restore_front(mem::take(&mut self.staged));
            tracker.recompute(conversation.messages());
        }
        warn!(restored, "compaction abandoned, previous memory retained");
        self.previous_memory.clear();
        self.state = CurationState::Idle;
        restored
    }
}

fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the compaction prompt from the existing memory, the culled
/// transcript, and the retained tail.
fn build_compaction_prompt(
    long_term_memory: &str,
    culled: &[Message],
    retained: &[Message],
) -> String {
    format!(
        "{COMPACTION_SYSTEM_PROMPT}\n\n<long_term_memory>\n{}\n</long_term_memory>\n\n<evicted_transcript>\n{}\n</evicted_transcript>\n\n<retained_context>\n{}\n</retained_context>",
        long_term_memory,
        render_transcript(culled),
        render_transcript(retained),
    )
}
