//! Event types for the conversation event bus.
//!
//! `ConversationEvent` is the change-notification stream a UI observes in
//! place of holding a reference into the working set. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

/// Events emitted as the conversation and curation engine mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A message was appended at `index`.
    MessageAppended { index: usize },

    /// The message at `index` changed in place (continuation merge).
    MessageUpdated { index: usize },

    /// The oldest `count` messages were removed by a cull.
    MessagesCulled { count: usize },

    /// A failed compaction put `count` culled messages back at the front.
    MessagesRestored { count: usize },

    /// A send was rejected because a reply is still pending.
    SendRejected,

    /// The trailing typing placeholder was removed.
    PlaceholderCleared,

    /// The live-memory token figure changed.
    LiveTokensChanged { tokens: u32 },

    /// A compaction pass has begun (cull staged, summary requested).
    CurationStarted,

    /// A compaction pass finished. `success: false` means the previous
    /// long-term memory was kept and the culled prefix restored.
    CurationFinished { success: bool },

    /// The attachment at `index` changed status or was removed.
    AttachmentChanged { index: usize },
}
