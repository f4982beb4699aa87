//! The conversation controller.
//!
//! Top-level orchestrator composing the working set, live-memory tracker,
//! curation engine, attachment registry, gateway, and persistence ports.
//! All state lives on the single logical thread that calls the controller;
//! gateway calls are spawned with owned requests and resume through an mpsc
//! channel of kind-tagged outcomes. The tag, not arrival order, routes each
//! outcome to the right handler -- a normal turn and a compaction turn can
//! resolve in either order without cross-talk.

use std::sync::Arc;
use std::time::Duration;

use tether_types::attachment::ManagedAttachment;
use tether_types::curation::CurationThresholds;
use tether_types::error::{ConfigError, PersistenceError};
use tether_types::event::ConversationEvent;
use tether_types::gateway::{GatewayError, GatewayReply, RequestKind, TurnRequest};
use tether_types::message::Message;
use tether_observe::genai_attrs;
use tokio::sync::{broadcast, mpsc};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::attachment::{AttachmentManifestStore, AttachmentRegistry};
use crate::conversation::Conversation;
use crate::curation::{CullOutcome, CurationEngine, CurationState};
use crate::events::ConversationEvents;
use crate::gateway::InterlocutorGateway;
use crate::log::ConversationLog;
use crate::memory::LongTermMemoryStore;
use crate::tracker::LiveMemoryTracker;

/// Fixed timeout bound to every outstanding gateway request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A completed gateway call, tagged for routing.
#[derive(Debug)]
enum GatewayOutcome {
    Reply {
        epoch: u64,
        reply: GatewayReply,
    },
    Failed {
        epoch: u64,
        kind: RequestKind,
        error: GatewayError,
    },
}

impl GatewayOutcome {
    fn epoch(&self) -> u64 {
        match self {
            GatewayOutcome::Reply { epoch, .. } | GatewayOutcome::Failed { epoch, .. } => *epoch,
        }
    }

    fn kind(&self) -> RequestKind {
        match self {
            GatewayOutcome::Reply { reply, .. } => reply.kind,
            GatewayOutcome::Failed { kind, .. } => *kind,
        }
    }
}

/// Orchestrates one conversation at a time against an interlocutor backend.
///
/// Generic over the gateway and the persistence ports so the core never
/// depends on tether-infra.
pub struct ConversationController<G, L, M, S> {
    identity: String,
    conversation: Conversation,
    tracker: LiveMemoryTracker,
    engine: CurationEngine,
    attachments: AttachmentRegistry<G, S>,
    gateway: Arc<G>,
    log: L,
    ltm_store: M,
    long_term_memory: String,
    events: ConversationEvents,
    outcome_tx: mpsc::UnboundedSender<GatewayOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<GatewayOutcome>,
    waiting_for_reply: bool,
    expecting_continuation: bool,
    in_flight: usize,
    /// Bumped on conversation switch; outcomes from an older epoch are
    /// dropped instead of being applied to the wrong conversation.
    epoch: u64,
    request_timeout: Duration,
}

impl<G, L, M, S> ConversationController<G, L, M, S>
where
    G: InterlocutorGateway + 'static,
    L: ConversationLog,
    M: LongTermMemoryStore,
    S: AttachmentManifestStore,
{
    pub fn new(
        gateway: Arc<G>,
        log: L,
        ltm_store: M,
        manifest_store: S,
        thresholds: CurationThresholds,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            identity: "default".to_string(),
            conversation: Conversation::new(),
            tracker: LiveMemoryTracker::new(),
            engine: CurationEngine::new(thresholds),
            attachments: AttachmentRegistry::new(Arc::clone(&gateway), manifest_store),
            gateway,
            log,
            ltm_store,
            long_term_memory: String::new(),
            events: ConversationEvents::new(64),
            outcome_tx,
            outcome_rx,
            waiting_for_reply: false,
            expecting_continuation: false,
            in_flight: 0,
            epoch: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    // --- Lifecycle ---

    /// Switch to (or create) the conversation for an identity: flush the
    /// current state, then load the transcript, long-term memory, and
    /// attachment manifest. Missing files yield an empty conversation.
    pub async fn load_conversation(&mut self, identity: &str) -> Result<(), PersistenceError> {
        self.flush();
        self.identity = identity.to_string();

        let records = self.log.load(identity).await?;
        let loaded = records.len();
        self.conversation.replace(records);
        // Per-message best-known costs; user records typically carry
        // promptTokens 0 on disk, so this leans on the heuristic until the
        // next authoritative usage report.
        self.tracker.recompute(self.conversation.messages());
        self.long_term_memory = self.ltm_store.load(identity).await?;
        self.attachments.load(identity).await?;

        self.events.publish(ConversationEvent::LiveTokensChanged {
            tokens: self.tracker.live_tokens(),
        });
        info!(
            identity,
            messages = loaded,
            live_tokens = self.tracker.live_tokens(),
            "conversation loaded"
        );
        Ok(())
    }

    /// Drop all transient state. The log is already durable per append, so
    /// nothing needs writing; a staged cull is discarded, which is safe
    /// because the log rewrite only happens on commit.
    pub fn flush(&mut self) {
        self.conversation.clear();
        self.tracker.recompute(&[]);
        self.attachments.clear();
        self.engine = CurationEngine::new(self.engine.thresholds());
        self.long_term_memory.clear();
        self.waiting_for_reply = false;
        self.expecting_continuation = false;
        self.epoch += 1;
    }

    /// Wipe the current conversation and its backing store.
    pub async fn clear_conversation(&mut self) -> Result<(), PersistenceError> {
        self.conversation.clear();
        self.tracker.recompute(&[]);
        self.waiting_for_reply = false;
        self.expecting_continuation = false;
        self.epoch += 1;
        self.log.clear(&self.identity).await?;
        self.events
            .publish(ConversationEvent::LiveTokensChanged { tokens: 0 });
        Ok(())
    }

    // --- Sending ---

    /// Accept user text and issue a normal turn.
    ///
    /// Rejected as a no-op while a normal reply is pending: the working set
    /// is unchanged and no second request is issued.
    #[tracing::instrument(name = "send_message", skip(self, text), fields(identity = %self.identity))]
    pub async fn send_message(&mut self, text: &str) -> Result<(), PersistenceError> {
        if self.waiting_for_reply {
            warn!("send rejected: already waiting for a reply");
            self.events.publish(ConversationEvent::SendRejected);
            return Ok(());
        }

        let message = Message::user(text);
        let cost = message.heuristic_cost();
        // Durable before the request leaves: a message is never reported
        // as sent without being recorded.
        self.log.append(&self.identity, &message).await?;
        let index = self.conversation.push(message);
        self.tracker.add(cost);
        self.events
            .publish(ConversationEvent::MessageAppended { index });
        self.events.publish(ConversationEvent::LiveTokensChanged {
            tokens: self.tracker.live_tokens(),
        });

        let request = TurnRequest::new(
            RequestKind::NormalMessage,
            self.conversation.persistable(),
            self.long_term_memory.clone(),
            self.attachments.ready_ids(),
        );

        let placeholder = self.conversation.set_typing_placeholder();
        self.events
            .publish(ConversationEvent::MessageAppended { index: placeholder });
        self.waiting_for_reply = true;
        self.dispatch(request);
        Ok(())
    }

    /// Send a message and process outcomes until nothing is in flight
    /// (the reply, and any compaction it triggered, have been handled).
    pub async fn send_and_settle(&mut self, text: &str) -> Result<(), PersistenceError> {
        self.send_message(text).await?;
        while self.in_flight > 0 {
            self.process_next_event().await?;
        }
        Ok(())
    }

    fn dispatch(&mut self, request: TurnRequest) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.outcome_tx.clone();
        let epoch = self.epoch;
        let timeout = self.request_timeout;
        let kind = request.kind;
        debug!(request_id = %request.id, %kind, "dispatching gateway request");
        let operation = match kind {
            RequestKind::NormalMessage => genai_attrs::OP_CHAT,
            RequestKind::CurationResult => genai_attrs::OP_COMPACT_MEMORY,
        };
        // OTel GenAI span around the whole call; usage recorded on reply.
        let span = info_span!(
            "gen_ai.send_request",
            { genai_attrs::GEN_AI_OPERATION_NAME } = operation,
            { genai_attrs::GEN_AI_PROVIDER_NAME } = gateway.name(),
            { genai_attrs::GEN_AI_USAGE_INPUT_TOKENS } = tracing::field::Empty,
            { genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS } = tracing::field::Empty,
        );
        self.in_flight += 1;
        tokio::spawn(
            async move {
                let outcome =
                    match tokio::time::timeout(timeout, gateway.send_request(request)).await {
                        Ok(Ok(reply)) => {
                            let span = tracing::Span::current();
                            span.record(genai_attrs::GEN_AI_USAGE_INPUT_TOKENS, reply.input_tokens);
                            span.record(
                                genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS,
                                reply.output_tokens,
                            );
                            GatewayOutcome::Reply { epoch, reply }
                        }
                        Ok(Err(error)) => GatewayOutcome::Failed { epoch, kind, error },
                        // Expiry drops the underlying call; no retry.
                        Err(_) => GatewayOutcome::Failed {
                            epoch,
                            kind,
                            error: GatewayError::Timeout {
                                secs: timeout.as_secs(),
                            },
                        },
                    };
                let _ = tx.send(outcome);
            }
            .instrument(span),
        );
    }

    // --- Reply routing ---

    /// Receive and handle one gateway outcome, routed by its kind tag.
    ///
    /// Returns the kind that was handled, or `None` when nothing is in
    /// flight. Outcomes issued before the last conversation switch are
    /// dropped.
    pub async fn process_next_event(&mut self) -> Result<Option<RequestKind>, PersistenceError> {
        while self.in_flight > 0 {
            let Some(outcome) = self.outcome_rx.recv().await else {
                return Ok(None);
            };
            self.in_flight -= 1;
            if outcome.epoch() != self.epoch {
                debug!(kind = %outcome.kind(), "dropping stale gateway outcome");
                continue;
            }
            let kind = outcome.kind();
            match outcome {
                GatewayOutcome::Reply { reply, .. } => match reply.kind {
                    RequestKind::NormalMessage => self.handle_normal_reply(reply).await?,
                    RequestKind::CurationResult => self.handle_curation_reply(reply).await?,
                },
                GatewayOutcome::Failed { kind, error, .. } => match kind {
                    RequestKind::NormalMessage => self.handle_normal_error(error).await?,
                    RequestKind::CurationResult => self.handle_curation_error(error),
                },
            }
            return Ok(Some(kind));
        }
        Ok(None)
    }

    async fn handle_normal_reply(&mut self, reply: GatewayReply) -> Result<(), PersistenceError> {
        if self.conversation.clear_typing_placeholder() {
            self.events.publish(ConversationEvent::PlaceholderCleared);
        }
        self.waiting_for_reply = false;

        // Authoritative usage overwrites the heuristic figure.
        self.tracker
            .set_authoritative(reply.input_tokens, reply.output_tokens);
        // The backend reports usage for the whole request; attribute the
        // prompt side to the user message that triggered it, as the legacy
        // transcript format does. RAM only: the user record was already
        // appended with promptTokens 0 and is not rewritten here, so a
        // reload falls back to its heuristic cost until some later full
        // rewrite (continuation merge, cull commit) persists the figure.
        if let Some(user) = self.conversation.last_user_mut() {
            user.prompt_tokens = reply.input_tokens;
        }

        if self.expecting_continuation {
            // The previous reply was truncated: extend the same assistant
            // message instead of creating a new one.
            if let Some((index, message)) = self.conversation.last_assistant_mut() {
                message.text.push_str(&reply.text);
                message.completion_tokens += reply.output_tokens;
                self.events
                    .publish(ConversationEvent::MessageUpdated { index });
                // Keep the durable record in step with the merged message.
                self.log
                    .rewrite(&self.identity, &self.conversation.persistable())
                    .await?;
            } else {
                warn!("continuation expected but no assistant message to merge into");
            }
        } else {
            let message = Message::assistant(&reply.text, reply.output_tokens);
            self.log.append(&self.identity, &message).await?;
            let index = self.conversation.push(message);
            self.events
                .publish(ConversationEvent::MessageAppended { index });
        }
        self.expecting_continuation = reply.is_incomplete;

        self.events.publish(ConversationEvent::LiveTokensChanged {
            tokens: self.tracker.live_tokens(),
        });
        self.maybe_curate();
        Ok(())
    }

    async fn handle_normal_error(&mut self, error: GatewayError) -> Result<(), PersistenceError> {
        warn!("interlocutor error: {error}");
        if self.conversation.clear_typing_placeholder() {
            self.events.publish(ConversationEvent::PlaceholderCleared);
        }
        self.waiting_for_reply = false;
        self.expecting_continuation = false;

        let message = Message::system_error(format!("Error from interlocutor: {error}"));
        let cost = message.heuristic_cost();
        self.log.append(&self.identity, &message).await?;
        let index = self.conversation.push(message);
        self.tracker.add(cost);
        self.events
            .publish(ConversationEvent::MessageAppended { index });
        self.events.publish(ConversationEvent::LiveTokensChanged {
            tokens: self.tracker.live_tokens(),
        });
        Ok(())
    }

    fn maybe_curate(&mut self) {
        if !self.engine.should_trigger(self.tracker.live_tokens()) {
            return;
        }
        match self.engine.begin(
            &mut self.conversation,
            &mut self.tracker,
            &self.long_term_memory,
        ) {
            CullOutcome::Started { request, culled } => {
                self.events
                    .publish(ConversationEvent::MessagesCulled { count: culled });
                self.events.publish(ConversationEvent::LiveTokensChanged {
                    tokens: self.tracker.live_tokens(),
                });
                self.events.publish(ConversationEvent::CurationStarted);
                self.dispatch(request);
            }
            CullOutcome::NothingToCull | CullOutcome::NotIdle => {}
        }
    }

    async fn handle_curation_reply(&mut self, reply: GatewayReply) -> Result<(), PersistenceError> {
        let summary = reply.text.trim();
        if reply.is_incomplete || summary.is_empty() {
            warn!(
                is_incomplete = reply.is_incomplete,
                "curation reply unusable, keeping previous long-term memory"
            );
            self.abort_curation();
            return Ok(());
        }

        match self
            .engine
            .commit(
                &self.identity,
                summary,
                &self.ltm_store,
                &self.log,
                &self.conversation,
            )
            .await
        {
            Ok(()) => {
                self.long_term_memory = summary.to_string();
                self.events
                    .publish(ConversationEvent::CurationFinished { success: true });
            }
            Err(e) => {
                warn!("curation commit failed: {e}");
                self.abort_curation();
            }
        }
        Ok(())
    }

    fn handle_curation_error(&mut self, error: GatewayError) {
        warn!("curation request failed: {error}");
        self.abort_curation();
    }

    /// Failure path: previous long-term memory retained, culled prefix
    /// restored, reported through the event bus rather than the chat.
    fn abort_curation(&mut self) {
        let restored = self.engine.abort(&mut self.conversation, &mut self.tracker);
        if restored > 0 {
            self.events
                .publish(ConversationEvent::MessagesRestored { count: restored });
            self.events.publish(ConversationEvent::LiveTokensChanged {
                tokens: self.tracker.live_tokens(),
            });
        }
        self.events
            .publish(ConversationEvent::CurationFinished { success: false });
    }

    // --- Attachments ---

    /// Upload a file for use in upcoming turns.
    pub async fn upload_attachment(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<usize, PersistenceError> {
        let index = self.attachments.upload(&self.identity, name, bytes).await?;
        self.events
            .publish(ConversationEvent::AttachmentChanged { index });
        Ok(index)
    }

    /// Remove an attachment; the remote delete is best-effort.
    pub async fn delete_attachment(&mut self, index: usize) -> Result<(), PersistenceError> {
        self.attachments.delete(&self.identity, index).await?;
        self.events
            .publish(ConversationEvent::AttachmentChanged { index });
        Ok(())
    }

    // --- Configuration ---

    /// Reconfigure curation thresholds; an invalid pair is rejected and the
    /// previous configuration retained.
    pub fn set_thresholds(&mut self, trigger: u32, target: u32) -> Result<(), ConfigError> {
        self.engine.set_thresholds(trigger, target)
    }

    // --- Observation ---

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn live_tokens(&self) -> u32 {
        self.tracker.live_tokens()
    }

    pub fn long_term_memory(&self) -> &str {
        &self.long_term_memory
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting_for_reply
    }

    pub fn curation_state(&self) -> CurationState {
        self.engine.state()
    }

    pub fn attachments(&self) -> &[ManagedAttachment] {
        self.attachments.entries()
    }

    /// Subscribe to conversation change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }
}
