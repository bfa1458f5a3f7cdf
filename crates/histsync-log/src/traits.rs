use histsync_types::{ChangeSet, ContextName, OriginatorId, Timestamp, Transaction};

use crate::error::Result;

/// Which entries a fetch skips.
///
/// A writer never re-merges what it produced itself, so fetches normally
/// exclude both its author identifier and its context name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchFilter {
    /// If set, entries by this author are skipped.
    pub exclude_author: Option<OriginatorId>,
    /// If set, entries produced under this context name are skipped.
    pub exclude_context: Option<ContextName>,
}

impl FetchFilter {
    /// Skip entries authored by `author` or produced under `context`.
    pub fn excluding(author: OriginatorId, context: ContextName) -> Self {
        Self {
            exclude_author: Some(author),
            exclude_context: Some(context),
        }
    }

    /// Returns `true` if the transaction passes this filter.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(ref author) = self.exclude_author {
            if &tx.author == author {
                return false;
            }
        }
        if let Some(ref context) = self.exclude_context {
            if &tx.context_name == context {
                return false;
            }
        }
        true
    }
}

/// The shared, append-only transaction log.
///
/// Entries are ordered by timestamp ascending. Implementations must be
/// thread-safe and must never reorder or alter an entry once written; the
/// only removal path is [`HistoryLog::delete_before`].
pub trait HistoryLog: Send + Sync {
    /// Append a new transaction, stamping it with the log's clock.
    ///
    /// The issued timestamp is strictly greater than every entry already in
    /// the log.
    fn append(
        &self,
        author: &OriginatorId,
        context_name: &ContextName,
        changes: ChangeSet,
    ) -> Result<Transaction>;

    /// Insert an already-stamped transaction, e.g. when importing history.
    fn insert(&self, tx: Transaction) -> Result<()>;

    /// Every entry with timestamp strictly greater than `after` that passes
    /// `filter`, in ascending timestamp order.
    fn fetch_after(&self, after: Timestamp, filter: &FetchFilter) -> Result<Vec<Transaction>>;

    /// Remove every entry with timestamp strictly before `cutoff`.
    ///
    /// Destructive and unconditional. Returns the number of removed entries.
    fn delete_before(&self, cutoff: Timestamp) -> Result<usize>;

    /// All entries, in ascending timestamp order.
    fn read_all(&self) -> Result<Vec<Transaction>>;

    /// Number of entries in the log.
    fn len(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    /// Returns `true` if the log holds no entries.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Timestamp of the newest entry, if any.
    fn latest_timestamp(&self) -> Result<Option<Timestamp>> {
        Ok(self.read_all()?.last().map(|tx| tx.timestamp))
    }
}
