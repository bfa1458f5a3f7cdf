//! Error types for watermark operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing watermarks.
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// A stored watermark could not be decoded.
    #[error("corrupt watermark entry at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// A key does not follow the watermark key layout.
    #[error("not a watermark key: {key}")]
    InvalidKey { key: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("watermark store lock poisoned")]
    LockPoisoned,

    /// I/O error during file-based watermark operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for watermark operations.
pub type Result<T> = std::result::Result<T, WatermarkError>;
