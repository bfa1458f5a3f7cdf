use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid originator identifier {id:?}: {reason}")]
    InvalidOriginatorId { id: String, reason: String },

    #[error("invalid context name {name:?}: {reason}")]
    InvalidContextName { name: String, reason: String },

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
