//! The conversation working set.
//!
//! An owned, ordered sequence of messages; insertion order is display and
//! causal order. Observers never hold a reference into the list -- they
//! watch `ConversationEvent`s and read snapshots. Invariant: at most one
//! typing placeholder exists at any time and it is always the trailing
//! message; placeholders are never persisted.

use tether_types::message::{Message, MessageRole};

/// Ordered in-memory working set of one conversation.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the working set from loaded records, dropping any
    /// placeholder flags that should not have survived persistence.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.messages.retain(|m| !m.is_typing_placeholder);
    }

    /// Append a message at the end, keeping the placeholder trailing.
    ///
    /// Returns the index of the inserted message.
    pub fn push(&mut self, message: Message) -> usize {
        debug_assert!(!message.is_typing_placeholder);
        match self.placeholder_index() {
            Some(i) => {
                self.messages.insert(i, message);
                i
            }
            None => {
                self.messages.push(message);
                self.messages.len() - 1
            }
        }
    }

    /// Remove and return the oldest message. Used by the cull.
    pub fn pop_front(&mut self) -> Option<Message> {
        if self.messages.is_empty() {
            None
        } else {
            Some(self.messages.remove(0))
        }
    }

    /// Reinsert a previously culled prefix at the front, oldest first.
    pub fn restore_front(&mut self, prefix: Vec<Message>) {
        self.messages.splice(0..0, prefix);
    }

    /// Install the trailing typing placeholder, replacing any existing one.
    pub fn set_typing_placeholder(&mut self) -> usize {
        self.clear_typing_placeholder();
        self.messages.push(Message::typing_placeholder());
        self.messages.len() - 1
    }

    /// Remove the trailing placeholder if present. Returns whether one was
    /// removed.
    pub fn clear_typing_placeholder(&mut self) -> bool {
        match self.placeholder_index() {
            Some(i) => {
                self.messages.remove(i);
                true
            }
            None => false,
        }
    }

    fn placeholder_index(&self) -> Option<usize> {
        // The placeholder is always trailing, so only the last slot can
        // hold one.
        if self.messages.last().is_some_and(|m| m.is_typing_placeholder) {
            Some(self.messages.len() - 1)
        } else {
            None
        }
    }

    /// Mutable access to the newest real assistant message, for the
    /// continuation merge.
    pub fn last_assistant_mut(&mut self) -> Option<(usize, &mut Message)> {
        self.messages
            .iter_mut()
            .enumerate()
            .rev()
            .find(|(_, m)| {
                m.role == MessageRole::Assistant && !m.is_typing_placeholder && !m.is_error
            })
    }

    /// Mutable access to the newest user message, for attributing
    /// authoritative prompt-token usage.
    pub fn last_user_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }

    /// Read-only view of the full working set, placeholder included.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Clone of the working set without the transient placeholder -- the
    /// shape that is persisted and sent to the gateway.
    pub fn persistable(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !m.is_typing_placeholder)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_placeholder_trailing() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        conv.set_typing_placeholder();
        let idx = conv.push(Message::assistant("hello", 2));

        assert_eq!(idx, 1);
        assert_eq!(conv.len(), 3);
        assert!(conv.messages().last().unwrap().is_typing_placeholder);
    }

    #[test]
    fn test_at_most_one_placeholder() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        conv.set_typing_placeholder();
        conv.set_typing_placeholder();

        let placeholders = conv
            .messages()
            .iter()
            .filter(|m| m.is_typing_placeholder)
            .count();
        assert_eq!(placeholders, 1);
    }

    #[test]
    fn test_persistable_skips_placeholder() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        conv.set_typing_placeholder();

        let persistable = conv.persistable();
        assert_eq!(persistable.len(), 1);
        assert_eq!(persistable[0].text, "hi");
    }

    #[test]
    fn test_clear_typing_placeholder() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        assert!(!conv.clear_typing_placeholder());
        conv.set_typing_placeholder();
        assert!(conv.clear_typing_placeholder());
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_pop_front_and_restore() {
        let mut conv = Conversation::new();
        conv.push(Message::user("one"));
        conv.push(Message::assistant("two", 1));
        conv.push(Message::user("three"));

        let a = conv.pop_front().unwrap();
        let b = conv.pop_front().unwrap();
        assert_eq!(a.text, "one");
        assert_eq!(b.text, "two");
        assert_eq!(conv.len(), 1);

        conv.restore_front(vec![a, b]);
        assert_eq!(conv.messages()[0].text, "one");
        assert_eq!(conv.messages()[1].text, "two");
        assert_eq!(conv.messages()[2].text, "three");
    }

    #[test]
    fn test_last_assistant_mut_skips_errors_and_placeholder() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        conv.push(Message::assistant("a", 1));
        conv.push(Message::system_error("boom"));
        conv.set_typing_placeholder();

        let (idx, msg) = conv.last_assistant_mut().unwrap();
        assert_eq!(idx, 1);
        assert_eq!(msg.text, "a");
    }

    #[test]
    fn test_replace_drops_placeholders() {
        let mut conv = Conversation::new();
        conv.replace(vec![Message::user("hi"), Message::typing_placeholder()]);
        assert_eq!(conv.len(), 1);
    }
}
