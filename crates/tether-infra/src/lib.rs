//! Infrastructure implementations for Tether.
//!
//! Filesystem adapters for the persistence ports defined in tether-core:
//! the JSONL conversation log, the long-term-memory file store with
//! timestamped backups, and the attachment manifest. One directory holds
//! all files for all conversation identities; every identity maps to a
//! small fixed set of file names inside it.

pub mod filesystem;
pub mod paths;

#[cfg(test)]
mod engine_tests;
