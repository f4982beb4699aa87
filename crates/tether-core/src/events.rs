//! Broadcast event bus for distributing `ConversationEvent` to observers.
//!
//! Built on `tokio::sync::broadcast`. A UI binds to this stream instead of
//! holding a reference into the working set. Publishing with no active
//! subscribers is a no-op.

use tether_types::event::ConversationEvent;
use tokio::sync::broadcast;

/// Multi-consumer event bus for conversation change notifications.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the bus clones the
/// sender, allowing multiple producers and consumers.
pub struct ConversationEvents {
    sender: broadcast::Sender<ConversationEvent>,
}

impl ConversationEvents {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: ConversationEvent) {
        let _ = self.sender.send(event);
    }
}

impl Clone for ConversationEvents {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for ConversationEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEvents")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
