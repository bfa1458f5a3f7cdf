//! Merge watermarks for histsync.
//!
//! A watermark records, per originator, the timestamp of the last history
//! transaction that originator merged. Watermarks live in a key-value medium
//! every participating process can read, so one writer can see how far the
//! others have progressed before it prunes the shared log.
//!
//! # Architecture
//!
//! - Each originator writes **only its own** watermark during merge.
//! - After a successful prune, the pruning writer resets **every** roster
//!   watermark to "none".
//! - An absent watermark means "never merged" and blocks pruning.
//!
//! # Modules
//!
//! - [`error`]: Error types for watermark operations
//! - [`keys`]: Deterministic key layout derived from originator identifiers
//! - [`traits`]: The [`WatermarkStore`] trait defining the storage interface
//! - [`memory`]: In-memory [`InMemoryWatermarkStore`] for tests
//! - [`file`]: Crash-durable [`FileWatermarkStore`] shared across processes

pub mod error;
pub mod file;
pub mod keys;
pub mod memory;
pub mod traits;

pub use error::{Result, WatermarkError};
pub use file::FileWatermarkStore;
pub use keys::{originator_from_key, watermark_key, WATERMARK_KEY_PREFIX};
pub use memory::InMemoryWatermarkStore;
pub use traits::WatermarkStore;
