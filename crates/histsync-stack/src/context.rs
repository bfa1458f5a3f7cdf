use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;
use tracing::debug;

use histsync_log::HistoryLog;
use histsync_processor::{ApplyError, ContextBridge, StoreCoordinator};
use histsync_types::{ChangeSet, ContextName, OriginatorId, RecordChange, Timestamp, Transaction};

/// Record cache: entity -> key -> value.
pub type Records = BTreeMap<String, BTreeMap<String, Value>>;

/// Latest write to one record. A `None` value is a delete.
#[derive(Clone, Debug)]
struct Slot {
    value: Option<Value>,
    stamp: Timestamp,
}

type Slots = BTreeMap<String, BTreeMap<String, Slot>>;

/// A writer-local view of the record store.
///
/// Saves are appended to the shared log under this context's name and
/// author, forwarded to sibling contexts of the same writer, and announced on
/// the coordinator. Merged history arrives through [`ContextBridge::apply`].
///
/// Every record remembers the timestamp of the transaction that last wrote
/// it, deletes included. A change older than that is ignored, so replaying
/// history after a prune never rolls a record back.
pub struct RecordContext {
    name: ContextName,
    author: OriginatorId,
    records: RwLock<Slots>,
    log: Arc<dyn HistoryLog>,
    coordinator: StoreCoordinator,
    siblings: RwLock<Vec<Weak<RecordContext>>>,
}

impl RecordContext {
    pub fn new(
        name: ContextName,
        author: OriginatorId,
        log: Arc<dyn HistoryLog>,
        coordinator: StoreCoordinator,
    ) -> Self {
        Self {
            name,
            author,
            records: RwLock::new(Slots::new()),
            log,
            coordinator,
            siblings: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &ContextName {
        &self.name
    }

    /// Author stamped on every transaction this context saves.
    pub fn author(&self) -> &OriginatorId {
        &self.author
    }

    /// Forward saves and merges from `self` to `sibling`, and back.
    pub fn link(self: &Arc<Self>, sibling: &Arc<RecordContext>) {
        self.siblings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(sibling));
        sibling
            .siblings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(self));
    }

    pub fn get(&self, entity: &str, key: &str) -> Option<Value> {
        self.read_records()
            .get(entity)
            .and_then(|keys| keys.get(key))
            .and_then(|slot| slot.value.clone())
    }

    /// Every record of one entity.
    pub fn entity(&self, entity: &str) -> BTreeMap<String, Value> {
        self.read_records()
            .get(entity)
            .map(live_values)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Records {
        self.read_records()
            .iter()
            .map(|(entity, keys)| (entity.clone(), live_values(keys)))
            .filter(|(_, keys)| !keys.is_empty())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.read_records()
            .values()
            .flat_map(BTreeMap::values)
            .filter(|slot| slot.value.is_some())
            .count()
    }

    /// Persist a change set.
    ///
    /// Appends a transaction to the shared log, then applies the changes
    /// here and in every sibling, then signals the coordinator. An empty
    /// change set writes nothing and returns `Ok(None)`. If the append
    /// fails no context is modified.
    pub fn save(&self, changes: ChangeSet) -> histsync_log::Result<Option<Transaction>> {
        if changes.is_empty() {
            return Ok(None);
        }
        let tx = self.log.append(&self.author, &self.name, changes)?;
        debug!(context = %self.name, id = %tx.id, changes = tx.changes.len(), "context save");

        self.merge_changes(&tx.changes, tx.timestamp);
        self.forward(&tx.changes, tx.timestamp);
        self.coordinator.notify_remote_change();
        Ok(Some(tx))
    }

    /// Apply changes stamped `stamp` to this context's cache only, skipping
    /// records already written by a newer transaction.
    fn merge_changes(&self, changes: &ChangeSet, stamp: Timestamp) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        for change in changes.changes() {
            let (entity, key, value) = match change {
                RecordChange::Upsert { entity, key, value } => (entity, key, Some(value.clone())),
                RecordChange::Delete { entity, key } => (entity, key, None),
            };
            let keys = records.entry(entity.clone()).or_default();
            if let Some(slot) = keys.get(key).filter(|slot| slot.stamp > stamp) {
                debug!(context = %self.name, %entity, %key, %stamp, newer = %slot.stamp, "stale change skipped");
                continue;
            }
            keys.insert(key.clone(), Slot { value, stamp });
        }
    }

    fn forward(&self, changes: &ChangeSet, stamp: Timestamp) {
        let siblings: Vec<Arc<RecordContext>> = self
            .siblings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for sibling in siblings {
            sibling.merge_changes(changes, stamp);
        }
    }

    fn read_records(&self) -> std::sync::RwLockReadGuard<'_, Slots> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn live_values(keys: &BTreeMap<String, Slot>) -> BTreeMap<String, Value> {
    keys.iter()
        .filter_map(|(key, slot)| Some((key.clone(), slot.value.clone()?)))
        .collect()
}

impl ContextBridge for RecordContext {
    fn context_name(&self) -> ContextName {
        self.name.clone()
    }

    fn apply(&self, tx: &Transaction) -> Result<(), ApplyError> {
        if !tx.verify_integrity() {
            return Err(ApplyError::new(format!("transaction {} failed its integrity check", tx.id)));
        }
        self.merge_changes(&tx.changes, tx.timestamp);
        self.forward(&tx.changes, tx.timestamp);
        Ok(())
    }
}

impl fmt::Debug for RecordContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordContext")
            .field("name", &self.name)
            .field("author", &self.author)
            .field("records", &self.record_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histsync_log::InMemoryHistoryLog;
    use histsync_types::Timestamp;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(s: &str) -> OriginatorId {
        OriginatorId::new(s).unwrap()
    }

    fn pair(log: Arc<InMemoryHistoryLog>, coordinator: &StoreCoordinator) -> (Arc<RecordContext>, Arc<RecordContext>) {
        let name = ContextName::for_originator(&id("app"));
        let main = Arc::new(RecordContext::new(name.clone(), id("app"), log.clone(), coordinator.clone()));
        let background = Arc::new(RecordContext::new(name, id("app"), log, coordinator.clone()));
        main.link(&background);
        (main, background)
    }

    #[test]
    fn save_appends_and_forwards_to_sibling() {
        let log = Arc::new(InMemoryHistoryLog::new());
        let (main, background) = pair(log.clone(), &StoreCoordinator::new());

        let tx = main
            .save(ChangeSet::default().upsert("note", "n1", json!("hello")))
            .unwrap()
            .unwrap();

        assert_eq!(tx.author, id("app"));
        assert_eq!(tx.context_name.as_str(), "app");
        assert_eq!(log.len().unwrap(), 1);
        assert_eq!(main.get("note", "n1"), Some(json!("hello")));
        assert_eq!(background.get("note", "n1"), Some(json!("hello")));
    }

    #[test]
    fn save_signals_the_coordinator() {
        let coordinator = StoreCoordinator::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = coordinator.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (main, _background) = pair(Arc::new(InMemoryHistoryLog::new()), &coordinator);

        main.save(ChangeSet::default().upsert("note", "n1", json!(1))).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_save_writes_nothing() {
        let log = Arc::new(InMemoryHistoryLog::new());
        let (main, _background) = pair(log.clone(), &StoreCoordinator::new());

        assert!(main.save(ChangeSet::default()).unwrap().is_none());
        assert!(log.is_empty().unwrap());
    }

    #[test]
    fn apply_is_idempotent() {
        let log = Arc::new(InMemoryHistoryLog::new());
        let (main, background) = pair(log, &StoreCoordinator::new());
        let tx = Transaction::new(
            id("widget"),
            ContextName::for_originator(&id("widget")),
            Timestamp::from_millis(10),
            ChangeSet::default()
                .upsert("note", "n1", json!({"title": "a"}))
                .upsert("note", "n2", json!({"title": "b"})),
        );

        background.apply(&tx).unwrap();
        let once = background.snapshot();
        background.apply(&tx).unwrap();

        assert_eq!(background.snapshot(), once);
        assert_eq!(background.record_count(), 2);
        // Merged history reaches the main context too.
        assert_eq!(main.snapshot(), once);
    }

    #[test]
    fn delete_removes_record_and_empty_entity() {
        let (main, _background) = pair(Arc::new(InMemoryHistoryLog::new()), &StoreCoordinator::new());
        main.save(ChangeSet::default().upsert("note", "n1", json!(1))).unwrap();
        main.save(ChangeSet::default().delete("note", "n1")).unwrap();

        assert_eq!(main.get("note", "n1"), None);
        assert!(main.entity("note").is_empty());
        assert!(main.snapshot().is_empty());

        // Deleting a missing record is a no-op.
        main.save(ChangeSet::default().delete("note", "n1")).unwrap();
        assert_eq!(main.record_count(), 0);
    }

    fn remote(ms: u64, changes: ChangeSet) -> Transaction {
        Transaction::new(
            id("widget"),
            ContextName::for_originator(&id("widget")),
            Timestamp::from_millis(ms),
            changes,
        )
    }

    #[test]
    fn older_remote_write_does_not_override_newer_one() {
        let (main, background) = pair(Arc::new(InMemoryHistoryLog::new()), &StoreCoordinator::new());

        background
            .apply(&remote(20, ChangeSet::default().upsert("note", "n1", json!("new"))))
            .unwrap();
        background
            .apply(&remote(10, ChangeSet::default().upsert("note", "n1", json!("old"))))
            .unwrap();

        assert_eq!(background.get("note", "n1"), Some(json!("new")));
        assert_eq!(main.get("note", "n1"), Some(json!("new")));
    }

    #[test]
    fn replayed_history_does_not_roll_back_a_local_save() {
        let (main, background) = pair(Arc::new(InMemoryHistoryLog::new()), &StoreCoordinator::new());
        let old = remote(1, ChangeSet::default().upsert("note", "n1", json!("remote")));

        background.apply(&old).unwrap();
        main.save(ChangeSet::default().upsert("note", "n1", json!("local")))
            .unwrap();
        // Watermarks reset after a prune, so the same entry arrives again.
        background.apply(&old).unwrap();

        assert_eq!(main.get("note", "n1"), Some(json!("local")));
        assert_eq!(background.get("note", "n1"), Some(json!("local")));
    }

    #[test]
    fn delete_blocks_an_older_upsert() {
        let (main, background) = pair(Arc::new(InMemoryHistoryLog::new()), &StoreCoordinator::new());

        background
            .apply(&remote(10, ChangeSet::default().upsert("note", "n1", json!(1))))
            .unwrap();
        background
            .apply(&remote(30, ChangeSet::default().delete("note", "n1")))
            .unwrap();
        background
            .apply(&remote(10, ChangeSet::default().upsert("note", "n1", json!(1))))
            .unwrap();

        assert_eq!(main.get("note", "n1"), None);
        assert_eq!(main.record_count(), 0);
        assert!(main.snapshot().is_empty());

        // A newer upsert revives it.
        background
            .apply(&remote(40, ChangeSet::default().upsert("note", "n1", json!(2))))
            .unwrap();
        assert_eq!(main.get("note", "n1"), Some(json!(2)));
    }

    #[test]
    fn tampered_transaction_is_rejected() {
        let (_main, background) = pair(Arc::new(InMemoryHistoryLog::new()), &StoreCoordinator::new());
        let mut tx = Transaction::new(
            id("widget"),
            ContextName::for_originator(&id("widget")),
            Timestamp::from_millis(10),
            ChangeSet::default().upsert("note", "n1", json!(1)),
        );
        tx.timestamp = Timestamp::from_millis(11);

        assert!(background.apply(&tx).is_err());
        assert_eq!(background.record_count(), 0);
    }
}
