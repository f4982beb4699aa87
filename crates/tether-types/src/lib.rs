//! Shared domain types for Tether.
//!
//! This crate contains the core domain types used across the Tether memory
//! engine: Message, gateway request/reply shapes, managed attachments,
//! curation thresholds, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod attachment;
pub mod curation;
pub mod error;
pub mod event;
pub mod gateway;
pub mod message;
