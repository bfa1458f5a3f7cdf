//! Shared history log for histsync.
//!
//! Every save by any writer appends one [`Transaction`] to this log. Writers
//! fetch the entries authored by others since their own watermark, and the
//! log is pruned once every writer has moved past a point.
//!
//! The log itself enforces no per-writer safety: `delete_before` removes
//! whatever is older than the cutoff it is handed. Choosing a safe cutoff is
//! the merge processor's job.
//!
//! [`Transaction`]: histsync_types::Transaction

pub mod clock;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use clock::HistoryClock;
pub use error::{LogError, Result};
pub use file::{FileHistoryLog, LogConfig, LogRevision, SyncMode};
pub use memory::InMemoryHistoryLog;
pub use traits::{FetchFilter, HistoryLog};
