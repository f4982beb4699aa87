//! LongTermMemoryStore trait definition.
//!
//! Durable storage of the single long-term ("ancient") memory blob per
//! conversation identity. Implementations live in tether-infra.

use tether_types::error::PersistenceError;

/// Durable store for the compacted long-term memory summary.
pub trait LongTermMemoryStore: Send + Sync {
    /// Load the current blob; empty string when none exists yet.
    fn load(
        &self,
        identity: &str,
    ) -> impl std::future::Future<Output = Result<String, PersistenceError>> + Send;

    /// Replace the blob wholesale.
    ///
    /// A write never destroys the previous value without first creating a
    /// timestamped backup copy (`<name>.<YYYYMMDD_HHmmss>.bak`).
    fn store(
        &self,
        identity: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}
