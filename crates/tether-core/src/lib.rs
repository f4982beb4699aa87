//! Conversation memory engine for Tether.
//!
//! This crate holds the curation engine, the live-memory accounting, the
//! conversation controller, and the gateway contract every interlocutor
//! backend implements. It defines the persistence "ports" (log, long-term
//! memory, attachment manifest traits) that the infrastructure layer
//! implements. It depends only on `tether-types` -- never on `tether-infra`
//! or any filesystem/HTTP crate.

pub mod attachment;
pub mod controller;
pub mod conversation;
pub mod curation;
pub mod events;
pub mod gateway;
pub mod log;
pub mod memory;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutil;
