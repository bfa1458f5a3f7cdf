use std::sync::RwLock;

use tracing::debug;

use histsync_types::{ChangeSet, ContextName, OriginatorId, Timestamp, Transaction};

use crate::clock::HistoryClock;
use crate::error::{LogError, Result};
use crate::traits::{FetchFilter, HistoryLog};

/// In-memory history log for tests, local demos, and embedding.
///
/// Entries are kept sorted by timestamp; entries sharing a timestamp keep
/// their insertion order.
pub struct InMemoryHistoryLog {
    clock: HistoryClock,
    entries: RwLock<Vec<Transaction>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self {
            clock: HistoryClock::new(),
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryHistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLog for InMemoryHistoryLog {
    fn append(
        &self,
        author: &OriginatorId,
        context_name: &ContextName,
        changes: ChangeSet,
    ) -> Result<Transaction> {
        let mut entries = self.entries.write().map_err(|_| LogError::LockPoisoned)?;

        if let Some(last) = entries.last() {
            self.clock.observe(last.timestamp);
        }
        let tx = Transaction::new(
            author.clone(),
            context_name.clone(),
            self.clock.now(),
            changes,
        );
        entries.push(tx.clone());

        debug!(id = %tx.id, author = %tx.author, timestamp = %tx.timestamp, "history append");
        Ok(tx)
    }

    fn insert(&self, tx: Transaction) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| LogError::LockPoisoned)?;
        self.clock.observe(tx.timestamp);
        let at = entries.partition_point(|e| e.timestamp <= tx.timestamp);
        entries.insert(at, tx);
        Ok(())
    }

    fn fetch_after(&self, after: Timestamp, filter: &FetchFilter) -> Result<Vec<Transaction>> {
        let entries = self.entries.read().map_err(|_| LogError::LockPoisoned)?;
        let start = entries.partition_point(|e| e.timestamp <= after);
        Ok(entries[start..]
            .iter()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    fn delete_before(&self, cutoff: Timestamp) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| LogError::LockPoisoned)?;
        let removed = entries.partition_point(|e| e.timestamp < cutoff);
        entries.drain(..removed);

        debug!(%cutoff, removed, "history delete");
        Ok(removed)
    }

    fn read_all(&self) -> Result<Vec<Transaction>> {
        let entries = self.entries.read().map_err(|_| LogError::LockPoisoned)?;
        Ok(entries.clone())
    }

    fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|_| LogError::LockPoisoned)?;
        Ok(entries.len())
    }

    fn latest_timestamp(&self) -> Result<Option<Timestamp>> {
        let entries = self.entries.read().map_err(|_| LogError::LockPoisoned)?;
        Ok(entries.last().map(|tx| tx.timestamp))
    }
}
