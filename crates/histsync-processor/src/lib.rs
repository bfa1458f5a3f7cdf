//! History merge processor for histsync.
//!
//! Reacts to "remote change" signals from a [`StoreCoordinator`] and runs one
//! cycle per signal:
//!
//! 1. **Merge**: fetch the transactions other writers appended since this
//!    writer's watermark, apply them through a [`ContextBridge`], and advance
//!    the watermark.
//! 2. **Prune**: compute the minimum watermark across the roster; if every
//!    writer has merged past some point, delete the log entries strictly
//!    before it and reset every watermark.
//!
//! Cycles of one processor never overlap. Failures are reported through
//! `tracing` and in the returned [`CycleReport`]; the next signal retries.

pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod processor;
pub mod report;
pub mod roster;

pub use bridge::{ApplyError, ContextBridge};
pub use coordinator::{RemoteChange, StoreCoordinator, Subscription, SubscriptionId};
pub use error::{Result, SyncError};
pub use processor::{common_timestamp, HistoryMergeProcessor, Lifecycle};
pub use report::{CycleReport, MergeOutcome, PruneOutcome};
pub use roster::validate_roster;
