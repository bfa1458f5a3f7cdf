//! Store wiring for histsync.
//!
//! A [`SyncStack`] is what one writer process opens: the shared file log and
//! watermark directory from a [`SyncConfig`], a main and a background
//! [`RecordContext`] that forward saves to each other, and a merge processor
//! applying other writers' history into the background context. A
//! [`LogWatcher`] turns writes by other processes into remote-change
//! signals.

pub mod config;
pub mod context;
pub mod error;
pub mod stack;
pub mod watcher;

pub use config::SyncConfig;
pub use context::{RecordContext, Records};
pub use error::{Result, StackError};
pub use stack::{StackStatus, SyncStack};
pub use watcher::{LogWatcher, WatcherHandle};
