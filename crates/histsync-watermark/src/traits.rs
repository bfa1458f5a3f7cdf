//! The [`WatermarkStore`] trait defining the watermark storage interface.
//!
//! Any backend (in-memory, filesystem, shared preferences database)
//! implements this trait to persist how far each originator has merged.

use histsync_types::{OriginatorId, Timestamp};

use crate::error::Result;

/// Storage backend for per-originator merge watermarks.
///
/// Implementations must be thread-safe (`Send + Sync`). Durable backends must
/// survive a process restart: the watermark is the only record of how far a
/// writer has merged. Writes for different originators must never conflict.
pub trait WatermarkStore: Send + Sync {
    /// Read an originator's watermark.
    ///
    /// Returns `Ok(None)` if the originator has never merged anything, or
    /// its watermark was reset by a prune.
    fn get(&self, originator: &OriginatorId) -> Result<Option<Timestamp>>;

    /// Write an originator's watermark. `None` removes the entry.
    fn set(&self, originator: &OriginatorId, watermark: Option<Timestamp>) -> Result<()>;

    /// Read the watermark of every originator in `roster`, in roster order.
    fn get_all(&self, roster: &[OriginatorId]) -> Result<Vec<(OriginatorId, Option<Timestamp>)>> {
        roster
            .iter()
            .map(|id| Ok((id.clone(), self.get(id)?)))
            .collect()
    }

    /// Reset every roster watermark to `None`.
    fn reset_all(&self, roster: &[OriginatorId]) -> Result<()> {
        for id in roster {
            self.set(id, None)?;
        }
        Ok(())
    }
}
