use thiserror::Error;

use histsync_log::LogError;
use histsync_types::{OriginatorId, TransactionId};
use histsync_watermark::WatermarkError;

use crate::bridge::ApplyError;

/// Errors produced by the merge processor.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The roster names some originator more than once. Fatal at construction.
    #[error("duplicate originator identifiers in roster: {duplicates:?}")]
    DuplicateOriginatorIdentifier { duplicates: Vec<OriginatorId> },

    /// The current originator is missing from its own roster.
    #[error("originator {originator} is not part of its own roster")]
    OriginatorNotInRoster { originator: OriginatorId },

    /// `process()` was called before `setup()`.
    #[error("history processor has not been set up")]
    NotConfigured,

    /// The log could not produce a transaction list; the merge is retried on
    /// the next signal.
    #[error("history fetch failed: {0}")]
    HistoryFetchFailed(#[source] LogError),

    /// The target context rejected a transaction.
    #[error("applying transaction {id} failed: {source}")]
    ApplyFailed {
        id: TransactionId,
        #[source]
        source: ApplyError,
    },

    /// Pruning the log failed; watermarks are left untouched.
    #[error("history delete failed: {0}")]
    DeleteFailed(#[source] LogError),

    /// Reading or writing a watermark failed.
    #[error("watermark store error: {0}")]
    Watermark(#[from] WatermarkError),
}

/// Convenience alias used throughout the processor crate.
pub type Result<T> = std::result::Result<T, SyncError>;
