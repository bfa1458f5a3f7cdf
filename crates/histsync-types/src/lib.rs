//! Foundation types for histsync.
//!
//! histsync keeps several independent writers consistent by exchanging an
//! append-only change log. This crate holds the vocabulary every other
//! histsync crate speaks.
//!
//! # Key Types
//!
//! - [`Timestamp`]: Hybrid logical timestamp ordering log entries
//! - [`OriginatorId`]: Validated identifier of a writer
//! - [`Originator`]: A writer together with the full roster it syncs with
//! - [`ContextName`]: Label of a writer-local execution surface
//! - [`Transaction`]: One authored, timestamped entry in the shared log
//! - [`ChangeSet`]: The payload a transaction carries

pub mod change;
pub mod error;
pub mod originator;
pub mod timestamp;
pub mod transaction;

pub use change::{ChangeSet, RecordChange};
pub use error::TypeError;
pub use originator::{ContextName, Originator, OriginatorId};
pub use timestamp::Timestamp;
pub use transaction::{Transaction, TransactionId};
