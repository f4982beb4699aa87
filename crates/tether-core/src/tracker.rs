//! Live-memory token accounting.
//!
//! Tracks the estimated or observed token cost of resending the current
//! working set on the next turn. A cheap length heuristic covers the window
//! before the first backend round trip; authoritative usage numbers from the
//! backend overwrite it and win until the next structural mutation.

use tether_types::message::Message;

/// Running token cost of the live (uncompacted) message window.
#[derive(Debug, Default)]
pub struct LiveMemoryTracker {
    tokens: u32,
}

impl LiveMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current live-memory figure.
    pub fn live_tokens(&self) -> u32 {
        self.tokens
    }

    /// Recompute from scratch using per-message best-known costs.
    ///
    /// Used after loading a transcript and after a cull abort, before any
    /// fresh authoritative measurement exists.
    pub fn recompute(&mut self, messages: &[Message]) -> u32 {
        self.tokens = messages
            .iter()
            .filter(|m| !m.is_typing_placeholder)
            .map(Message::token_cost)
            .sum();
        self.tokens
    }

    /// Overwrite the estimate with backend-reported usage.
    ///
    /// Authoritative values always win over heuristics: input tokens cover
    /// everything that was resent, output tokens the new reply.
    pub fn set_authoritative(&mut self, input_tokens: u32, output_tokens: u32) {
        self.tokens = input_tokens + output_tokens;
    }

    /// Account for one message added to the working set.
    pub fn add(&mut self, cost: u32) {
        self.tokens = self.tokens.saturating_add(cost);
    }

    /// Account for one message removed from the working set.
    pub fn deduct(&mut self, cost: u32) {
        self.tokens = self.tokens.saturating_sub(cost);
    }
}
