//! Curation threshold configuration.
//!
//! Live memory is compacted when it reaches `trigger_tokens`; the cull
//! removes the oldest messages until the live figure is at or under
//! `target_tokens`. The gap between the two is the hysteresis that keeps
//! compaction from firing on every turn.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default trigger threshold (tokens of live memory).
pub const DEFAULT_TRIGGER_TOKENS: u32 = 120_000;

/// Default target threshold the cull shrinks live memory down to.
pub const DEFAULT_TARGET_TOKENS: u32 = 100_000;

/// Validated token thresholds for the curation engine.
///
/// Invariant: `trigger_tokens > target_tokens`. A pair violating this is
/// rejected and the previous configuration retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationThresholds {
    pub trigger_tokens: u32,
    pub target_tokens: u32,
}

impl Default for CurationThresholds {
    fn default() -> Self {
        Self {
            trigger_tokens: DEFAULT_TRIGGER_TOKENS,
            target_tokens: DEFAULT_TARGET_TOKENS,
        }
    }
}

impl CurationThresholds {
    /// Build a validated threshold pair.
    pub fn new(trigger_tokens: u32, target_tokens: u32) -> Result<Self, ConfigError> {
        if trigger_tokens <= target_tokens {
            return Err(ConfigError::InvalidThresholds {
                trigger: trigger_tokens,
                target: target_tokens,
            });
        }
        Ok(Self {
            trigger_tokens,
            target_tokens,
        })
    }

    /// Replace this pair with a new one, keeping the current values when
    /// the new pair is invalid.
    pub fn set(&mut self, trigger_tokens: u32, target_tokens: u32) -> Result<(), ConfigError> {
        *self = Self::new(trigger_tokens, target_tokens)?;
        Ok(())
    }
}
