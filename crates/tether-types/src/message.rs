//! Conversation message types.
//!
//! `Message` is both the in-memory working-set record and the on-disk JSONL
//! record. The disk shape uses the legacy camelCase keys (`promptTokens`,
//! `completionTokens`, `isError`) so existing transcript files stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed per-message token overhead added on top of the length heuristic.
///
/// Covers role markers and message framing the backend counts but the raw
/// text does not.
pub const MESSAGE_TOKEN_OVERHEAD: u32 = 4;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in the conversation working set.
///
/// Owned exclusively by the `Conversation`; immutable after append except
/// for the text/completion-token fields during a continuation merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    /// Creation time, serialized ISO-8601.
    pub timestamp: DateTime<Utc>,
    /// Input tokens the backend reported for the request that carried this
    /// message (0 until the first authoritative measurement).
    #[serde(rename = "promptTokens", default)]
    pub prompt_tokens: u32,
    /// Output tokens the backend reported for this reply.
    #[serde(rename = "completionTokens", default)]
    pub completion_tokens: u32,
    /// Marks a locally generated error notice shown in the transcript.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    /// Transient typing indicator. Never persisted.
    #[serde(skip)]
    pub is_typing_placeholder: bool,
}

impl Message {
    /// A user-authored message, timestamped now.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            timestamp: Utc::now(),
            prompt_tokens: 0,
            completion_tokens: 0,
            is_error: false,
            is_typing_placeholder: false,
        }
    }

    /// An assistant reply with its authoritative completion-token count.
    pub fn assistant(text: impl Into<String>, completion_tokens: u32) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
            prompt_tokens: 0,
            completion_tokens,
            is_error: false,
            is_typing_placeholder: false,
        }
    }

    /// A chat-visible system error notice.
    pub fn system_error(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            text: text.into(),
            timestamp: Utc::now(),
            prompt_tokens: 0,
            completion_tokens: 0,
            is_error: true,
            is_typing_placeholder: false,
        }
    }

    /// The transient typing indicator shown while a reply is pending.
    pub fn typing_placeholder() -> Self {
        Self {
            role: MessageRole::Assistant,
            text: String::new(),
            timestamp: Utc::now(),
            prompt_tokens: 0,
            completion_tokens: 0,
            is_error: false,
            is_typing_placeholder: true,
        }
    }

    /// Cheap token estimate: text length / 4 plus a fixed overhead.
    ///
    /// Used only before the first authoritative usage report is available.
    pub fn heuristic_cost(&self) -> u32 {
        (self.text.len() as u32) / 4 + MESSAGE_TOKEN_OVERHEAD
    }

    /// Best-known token cost: authoritative counts when the backend has
    /// reported any, otherwise the heuristic.
    pub fn token_cost(&self) -> u32 {
        let authoritative = self.prompt_tokens + self.completion_tokens;
        if authoritative > 0 {
            authoritative
        } else {
            self.heuristic_cost()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_disk_shape_uses_legacy_keys() {
        let msg = Message::assistant("hello", 7);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["completionTokens"], 7);
        assert_eq!(json["promptTokens"], 0);
        assert_eq!(json["isError"], false);
        assert!(json.get("is_typing_placeholder").is_none());
    }

    #[test]
    fn test_placeholder_not_serialized_as_placeholder() {
        // serde(skip) means a round-tripped placeholder loses the flag;
        // callers must never persist placeholders in the first place.
        let msg = Message::typing_placeholder();
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(!back.is_typing_placeholder);
    }

    #[test]
    fn test_heuristic_cost() {
        let msg = Message::user("a".repeat(40));
        assert_eq!(msg.heuristic_cost(), 10 + MESSAGE_TOKEN_OVERHEAD);
    }

    #[test]
    fn test_token_cost_prefers_authoritative() {
        let mut msg = Message::user("a".repeat(400));
        assert_eq!(msg.token_cost(), msg.heuristic_cost());
        msg.prompt_tokens = 12;
        assert_eq!(msg.token_cost(), 12);
        msg.completion_tokens = 5;
        assert_eq!(msg.token_cost(), 17);
    }

    #[test]
    fn test_tolerates_missing_token_fields() {
        let json = r#"{"role":"user","text":"hi","timestamp":"2024-05-01T12:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.prompt_tokens, 0);
        assert!(!msg.is_error);
    }
}
