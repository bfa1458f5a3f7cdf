use std::fmt;

use histsync_types::Timestamp;

use crate::error::SyncError;

/// Result of the merge step of one cycle.
#[derive(Debug)]
pub enum MergeOutcome {
    /// Nothing newer than the watermark; the watermark was not touched.
    NothingToMerge,
    /// `count` transactions were applied and the watermark advanced.
    Merged { count: usize, watermark: Timestamp },
    /// The step aborted; the watermark keeps its old value.
    Failed(SyncError),
}

/// Result of the prune step of one cycle.
#[derive(Debug)]
pub enum PruneOutcome {
    /// Some originator has no watermark; nothing is provably safe to delete.
    NoCommonPoint,
    /// Entries before `cutoff` were deleted and all watermarks reset.
    Pruned { cutoff: Timestamp, removed: usize },
    /// The step aborted; watermarks were left untouched.
    Failed(SyncError),
}

/// What one merge-then-prune cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub merge: MergeOutcome,
    pub prune: PruneOutcome,
}

impl CycleReport {
    /// Number of transactions merged this cycle.
    pub fn merged_count(&self) -> usize {
        match self.merge {
            MergeOutcome::Merged { count, .. } => count,
            _ => 0,
        }
    }

    /// Returns `true` if either step failed.
    pub fn has_failures(&self) -> bool {
        matches!(self.merge, MergeOutcome::Failed(_)) || matches!(self.prune, PruneOutcome::Failed(_))
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToMerge => write!(f, "no history transactions to merge"),
            Self::Merged { count, watermark } => {
                write!(f, "merged {count} transactions up to {watermark}")
            }
            Self::Failed(e) => write!(f, "merge failed: {e}"),
        }
    }
}

impl fmt::Display for PruneOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCommonPoint => write!(f, "no common transaction timestamp, skipping"),
            Self::Pruned { cutoff, removed } => {
                write!(f, "deleted {removed} transactions before {cutoff}")
            }
            Self::Failed(e) => write!(f, "prune failed: {e}"),
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {}", self.merge, self.prune)
    }
}
