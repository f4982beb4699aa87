//! Filesystem adapters for the tether-core persistence ports.

pub mod log;
pub mod manifest;
pub mod memory;

pub use log::JsonlConversationLog;
pub use manifest::JsonManifestStore;
pub use memory::FileLongTermMemoryStore;
