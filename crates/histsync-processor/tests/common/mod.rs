#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use histsync_log::{FetchFilter, HistoryLog, InMemoryHistoryLog, LogError};
use histsync_processor::{ApplyError, ContextBridge};
use histsync_types::{ChangeSet, ContextName, OriginatorId, Timestamp, Transaction};

pub fn id(s: &str) -> OriginatorId {
    OriginatorId::new(s).unwrap()
}

pub fn ctx(s: &str) -> ContextName {
    ContextName::new(s).unwrap()
}

pub fn ms(v: u64) -> Option<Timestamp> {
    Some(Timestamp::from_millis(v))
}

/// A transaction authored by `author` under `context` at `at` milliseconds.
pub fn entry(author: &str, context: &str, at: u64) -> Transaction {
    Transaction::new(
        id(author),
        ctx(context),
        Timestamp::from_millis(at),
        ChangeSet::default().upsert("note", at.to_string(), serde_json::json!({ "at": at })),
    )
}

pub fn millis(entries: &[Transaction]) -> Vec<u64> {
    entries.iter().map(|tx| tx.timestamp.physical_ms).collect()
}

/// Bridge recording every applied transaction.
pub struct RecordingBridge {
    name: ContextName,
    applied: Mutex<Vec<Transaction>>,
    fail_at: Mutex<Option<u64>>,
    panic_at: Mutex<Option<u64>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RecordingBridge {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, None))
    }

    /// Bridge that sleeps inside every apply, to widen race windows.
    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(name, Some(delay)))
    }

    fn build(name: &str, delay: Option<Duration>) -> Self {
        Self {
            name: ctx(name),
            applied: Mutex::new(Vec::new()),
            fail_at: Mutex::new(None),
            panic_at: Mutex::new(None),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Reject the transaction stamped at `at` milliseconds.
    pub fn fail_at(&self, at: Option<u64>) {
        *self.fail_at.lock().unwrap() = at;
    }

    /// Panic inside apply for the transaction stamped at `at` milliseconds.
    pub fn panic_at(&self, at: Option<u64>) {
        *self.panic_at.lock().unwrap() = at;
    }

    pub fn applied_millis(&self) -> Vec<u64> {
        millis(&self.applied.lock().unwrap())
    }

    pub fn applied_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    pub fn max_concurrent_applies(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl ContextBridge for RecordingBridge {
    fn context_name(&self) -> ContextName {
        self.name.clone()
    }

    fn apply(&self, tx: &Transaction) -> Result<(), ApplyError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let panic_now = *self.panic_at.lock().unwrap() == Some(tx.timestamp.physical_ms);
        if panic_now {
            panic!("record store crashed applying {}", tx.id);
        }
        let result = if *self.fail_at.lock().unwrap() == Some(tx.timestamp.physical_ms) {
            Err(ApplyError::new("record store rejected the change"))
        } else {
            self.applied.lock().unwrap().push(tx.clone());
            Ok(())
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// In-memory log whose fetch and delete can be switched to fail.
#[derive(Default)]
pub struct FlakyLog {
    inner: InMemoryHistoryLog,
    pub fail_fetch: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FlakyLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl HistoryLog for FlakyLog {
    fn append(
        &self,
        author: &OriginatorId,
        context_name: &ContextName,
        changes: ChangeSet,
    ) -> histsync_log::Result<Transaction> {
        self.inner.append(author, context_name, changes)
    }

    fn insert(&self, tx: Transaction) -> histsync_log::Result<()> {
        self.inner.insert(tx)
    }

    fn fetch_after(
        &self,
        after: Timestamp,
        filter: &FetchFilter,
    ) -> histsync_log::Result<Vec<Transaction>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(LogError::UnexpectedShape {
                offset: 0,
                reason: "payload is not a transaction list".into(),
            });
        }
        self.inner.fetch_after(after, filter)
    }

    fn delete_before(&self, cutoff: Timestamp) -> histsync_log::Result<usize> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(LogError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "log is read-only",
            )));
        }
        self.inner.delete_before(cutoff)
    }

    fn read_all(&self) -> histsync_log::Result<Vec<Transaction>> {
        self.inner.read_all()
    }
}
