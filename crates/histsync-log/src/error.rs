use std::io;

/// Errors produced by history log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// I/O error while reading or rewriting the log file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A transaction could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An entry passed its checksum but is not a transaction.
    #[error("entry at offset {offset} is not a history transaction: {reason}")]
    UnexpectedShape { offset: u64, reason: String },

    /// A transaction is too large to frame.
    #[error("transaction of {size} bytes exceeds the frame limit")]
    EntryTooLarge { size: usize },

    /// An internal lock was poisoned by a panicking writer.
    #[error("history log lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the log crate.
pub type Result<T> = std::result::Result<T, LogError>;
