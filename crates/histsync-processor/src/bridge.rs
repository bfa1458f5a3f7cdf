use std::fmt;

use histsync_types::{ContextName, Transaction};

/// Why a target context could not apply a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyError {
    reason: String,
}

impl ApplyError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for ApplyError {}

/// The execution context merged history is applied to.
///
/// `apply` must be idempotent: after a prune every writer re-fetches the
/// surviving log from the start, so a transaction may be applied more than
/// once. It must also not signal the coordinator synchronously, since it
/// runs inside a cycle.
pub trait ContextBridge: Send + Sync {
    /// Name of the context; entries produced under this name are never
    /// merged back into it.
    fn context_name(&self) -> ContextName;

    /// Apply one transaction's change set.
    fn apply(&self, tx: &Transaction) -> Result<(), ApplyError>;
}
