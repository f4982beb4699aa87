//! ConversationLog trait definition.
//!
//! Durable persistence of the conversation working set, keyed by a
//! conversation identity. Implementations live in tether-infra (e.g.
//! `JsonlConversationLog`). Uses native async fn in traits (RPITIT,
//! Rust 2024 edition).

use tether_types::error::PersistenceError;
use tether_types::message::Message;

/// Append-only durable log of one conversation per identity, with a
/// full-rewrite capability for the curation engine.
pub trait ConversationLog: Send + Sync {
    /// Durably persist one record. A message must be on stable storage
    /// before this resolves successfully; callers never pass typing
    /// placeholders.
    fn append(
        &self,
        identity: &str,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;

    /// Read all records for an identity. A record that fails to parse is
    /// skipped with a diagnostic, never fatal; loading continues.
    fn load(
        &self,
        identity: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, PersistenceError>> + Send;

    /// Replace the entire backing store with exactly the given sequence.
    ///
    /// Written to a temporary file and renamed over the original so a crash
    /// mid-rewrite cannot lose the previous contents.
    fn rewrite(
        &self,
        identity: &str,
        messages: &[Message],
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;

    /// Remove the backing store for an identity, if any.
    fn clear(
        &self,
        identity: &str,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}
