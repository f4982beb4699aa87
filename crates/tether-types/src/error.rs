use thiserror::Error;

/// Errors from persistence operations (used by the port traits in
/// tether-core; implementations live in tether-infra).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(String),

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("rename error: {0}")]
    Rename(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e.to_string())
    }
}

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("trigger threshold {trigger} must exceed target threshold {target}")]
    InvalidThresholds { trigger: u32, target: u32 },
}
