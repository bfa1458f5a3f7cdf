//! In-memory watermark store for testing and single-process embedding.
//!
//! [`InMemoryWatermarkStore`] keeps every watermark in a `HashMap` keyed by
//! the same key layout the durable store uses. Data is lost when the store
//! is dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use histsync_types::{OriginatorId, Timestamp};

use crate::error::{Result, WatermarkError};
use crate::keys::watermark_key;
use crate::traits::WatermarkStore;

/// An in-memory implementation of [`WatermarkStore`].
#[derive(Debug, Default)]
pub struct InMemoryWatermarkStore {
    entries: RwLock<HashMap<String, Timestamp>>,
}

impl InMemoryWatermarkStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of originators that currently have a watermark.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` if no originator has a watermark.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WatermarkStore for InMemoryWatermarkStore {
    fn get(&self, originator: &OriginatorId) -> Result<Option<Timestamp>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| WatermarkError::LockPoisoned)?;
        Ok(entries.get(&watermark_key(originator)).copied())
    }

    fn set(&self, originator: &OriginatorId, watermark: Option<Timestamp>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| WatermarkError::LockPoisoned)?;
        let key = watermark_key(originator);
        match watermark {
            Some(ts) => {
                entries.insert(key, ts);
            }
            None => {
                entries.remove(&key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> OriginatorId {
        OriginatorId::new(s).unwrap()
    }

    #[test]
    fn unset_watermark_is_none() {
        let store = InMemoryWatermarkStore::new();
        assert_eq!(store.get(&id("a")).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn set_and_get() {
        let store = InMemoryWatermarkStore::new();
        store.set(&id("a"), Some(Timestamp::from_millis(5))).unwrap();
        assert_eq!(store.get(&id("a")).unwrap(), Some(Timestamp::from_millis(5)));
        assert_eq!(store.get(&id("b")).unwrap(), None);
    }

    #[test]
    fn setting_none_removes_entry() {
        let store = InMemoryWatermarkStore::new();
        store.set(&id("a"), Some(Timestamp::from_millis(5))).unwrap();
        store.set(&id("a"), None).unwrap();
        assert_eq!(store.get(&id("a")).unwrap(), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn get_all_follows_roster_order() {
        let store = InMemoryWatermarkStore::new();
        store.set(&id("b"), Some(Timestamp::from_millis(8))).unwrap();

        let all = store.get_all(&[id("a"), id("b")]).unwrap();
        assert_eq!(
            all,
            vec![(id("a"), None), (id("b"), Some(Timestamp::from_millis(8)))]
        );
    }

    #[test]
    fn reset_all_clears_roster_only() {
        let store = InMemoryWatermarkStore::new();
        store.set(&id("a"), Some(Timestamp::from_millis(1))).unwrap();
        store.set(&id("b"), Some(Timestamp::from_millis(2))).unwrap();
        store.set(&id("outsider"), Some(Timestamp::from_millis(3))).unwrap();

        store.reset_all(&[id("a"), id("b")]).unwrap();

        assert_eq!(store.get(&id("a")).unwrap(), None);
        assert_eq!(store.get(&id("b")).unwrap(), None);
        assert_eq!(store.get(&id("outsider")).unwrap(), Some(Timestamp::from_millis(3)));
    }
}
