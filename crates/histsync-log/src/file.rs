use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use histsync_types::{ChangeSet, ContextName, OriginatorId, Timestamp, Transaction};

use crate::clock::HistoryClock;
use crate::error::{LogError, Result};
use crate::traits::{FetchFilter, HistoryLog};

/// Flush/sync strategy for log appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for a [`FileHistoryLog`].
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    /// Sync/flush strategy.
    pub sync_mode: SyncMode,
}

/// Cheap fingerprint of the log file, used to detect writes by other
/// processes without reading the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogRevision {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Entry count and newest timestamp as of a given revision.
#[derive(Clone, Copy, Debug)]
struct TailState {
    revision: LogRevision,
    len: usize,
    latest: Option<Timestamp>,
}

/// One decoded frame plus its raw bytes, so a rewrite can copy frames as-is.
struct Frame {
    tx: Transaction,
    raw: Vec<u8>,
}

/// History log kept in a single file shared by every writer process.
///
/// On-disk format, one frame per transaction:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Transaction)]
/// ```
///
/// Appends write a whole frame in one call on a file opened in append mode.
/// The file is re-opened for every operation, so a handle never outlives a
/// rewrite performed by another process. On read the file is scanned
/// front-to-back; frames that fail the CRC check are skipped (torn writes
/// from a crash) and a truncated tail ends the scan.
///
/// Appends, inserts and rewrites hold an exclusive advisory lock on a
/// sidecar `<path>.lock` file, so writers in different processes never
/// interleave a rewrite with an append. Readers take no lock.
pub struct FileHistoryLog {
    path: PathBuf,
    lock_path: PathBuf,
    clock: HistoryClock,
    /// Serializes appends and rewrites issued through this handle.
    write_lock: Mutex<()>,
    /// Last known tail; re-scanned only when the file revision moves.
    tail: Mutex<Option<TailState>>,
    config: LogConfig,
}

impl FileHistoryLog {
    /// Open (or create) a log file at the given path.
    pub fn open(path: &Path, config: LogConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)?;

        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".lock");

        debug!(path = %path.display(), "history log opened");
        Ok(Self {
            path: path.to_path_buf(),
            lock_path: PathBuf::from(lock_path),
            clock: HistoryClock::new(),
            write_lock: Mutex::new(()),
            tail: Mutex::new(None),
            config,
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current fingerprint of the log file.
    pub fn revision(&self) -> Result<LogRevision> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(LogRevision {
                len: meta.len(),
                modified: meta.modified().ok(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(LogRevision {
                len: 0,
                modified: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Take the cross-process writer lock. Released when the file drops.
    fn lock_writers(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// Entry count and newest timestamp, scanning only if the file changed
    /// since the last look.
    fn tail_state(&self) -> Result<TailState> {
        let revision = self.revision()?;
        if let Some(state) = *self.tail.lock().map_err(|_| LogError::LockPoisoned)? {
            if state.revision == revision {
                return Ok(state);
            }
        }
        let frames = self.read_frames()?;
        let state = TailState {
            revision,
            len: frames.len(),
            latest: frames.last().map(|f| f.tx.timestamp),
        };
        self.remember_tail(state)?;
        Ok(state)
    }

    fn remember_tail(&self, state: TailState) -> Result<()> {
        *self.tail.lock().map_err(|_| LogError::LockPoisoned)? = Some(state);
        Ok(())
    }

    /// Record a frame this handle just wrote while holding the writer lock.
    fn remember_write(&self, before: TailState, timestamp: Timestamp) -> Result<()> {
        self.remember_tail(TailState {
            revision: self.revision()?,
            len: before.len + 1,
            latest: before.latest.max(Some(timestamp)),
        })
    }

    fn encode_frame(tx: &Transaction) -> Result<Vec<u8>> {
        let payload = bincode::serialize(tx).map_err(|e| LogError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| LogError::EntryTooLarge { size: payload.len() })?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(frame)?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Read every intact frame, sorted by timestamp.
    fn read_frames(&self) -> Result<Vec<Frame>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::new();
        BufReader::new(file).read_to_end(&mut bytes)?;

        let file_len = bytes.len() as u64;
        let mut frames = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            let start = offset as usize;
            let header = &bytes[start..start + HEADER_SIZE];
            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
                warn!(offset, length, file_len, "truncated history frame; stopping scan");
                break;
            }

            let end = start + HEADER_SIZE + length as usize;
            let payload = &bytes[start + HEADER_SIZE..end];

            let actual_crc = crc32fast::hash(payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping history frame"
                );
                offset = end as u64;
                continue;
            }

            let tx: Transaction =
                bincode::deserialize(payload).map_err(|e| LogError::UnexpectedShape {
                    offset,
                    reason: e.to_string(),
                })?;
            if !tx.verify_integrity() {
                return Err(LogError::UnexpectedShape {
                    offset,
                    reason: format!("transaction {} does not match its content", tx.id),
                });
            }

            frames.push(Frame {
                tx,
                raw: bytes[start..end].to_vec(),
            });
            offset = end as u64;
        }

        // Concurrent writers may land frames slightly out of order.
        frames.sort_by_key(|f| f.tx.timestamp);
        Ok(frames)
    }
}

impl HistoryLog for FileHistoryLog {
    fn append(
        &self,
        author: &OriginatorId,
        context_name: &ContextName,
        changes: ChangeSet,
    ) -> Result<Transaction> {
        let _guard = self.write_lock.lock().map_err(|_| LogError::LockPoisoned)?;
        let _writers = self.lock_writers()?;

        let before = self.tail_state()?;
        if let Some(latest) = before.latest {
            self.clock.observe(latest);
        }
        let tx = Transaction::new(
            author.clone(),
            context_name.clone(),
            self.clock.now(),
            changes,
        );
        let frame = Self::encode_frame(&tx)?;
        self.write_frame(&frame)?;
        self.remember_write(before, tx.timestamp)?;

        debug!(id = %tx.id, author = %tx.author, timestamp = %tx.timestamp, len = frame.len(), "history append");
        Ok(tx)
    }

    fn insert(&self, tx: Transaction) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| LogError::LockPoisoned)?;
        let _writers = self.lock_writers()?;

        let before = self.tail_state()?;
        self.clock.observe(tx.timestamp);
        self.write_frame(&Self::encode_frame(&tx)?)?;
        self.remember_write(before, tx.timestamp)
    }

    fn fetch_after(&self, after: Timestamp, filter: &FetchFilter) -> Result<Vec<Transaction>> {
        Ok(self
            .read_frames()?
            .into_iter()
            .map(|f| f.tx)
            .filter(|tx| tx.timestamp > after && filter.matches(tx))
            .collect())
    }

    /// Rewrites the surviving frames into a temporary file and atomically
    /// renames it over the log.
    fn delete_before(&self, cutoff: Timestamp) -> Result<usize> {
        let _guard = self.write_lock.lock().map_err(|_| LogError::LockPoisoned)?;
        let _writers = self.lock_writers()?;

        let frames = self.read_frames()?;
        let total = frames.len();
        let kept: Vec<Frame> = frames
            .into_iter()
            .filter(|f| f.tx.timestamp >= cutoff)
            .collect();
        let removed = total - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        for frame in &kept {
            tmp.write_all(&frame.raw)?;
        }
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| LogError::Io(e.error))?;
        self.remember_tail(TailState {
            revision: self.revision()?,
            len: kept.len(),
            latest: kept.last().map(|f| f.tx.timestamp),
        })?;

        debug!(%cutoff, removed, kept = kept.len(), "history delete");
        Ok(removed)
    }

    fn read_all(&self) -> Result<Vec<Transaction>> {
        Ok(self.read_frames()?.into_iter().map(|f| f.tx).collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.tail_state()?.len)
    }

    fn latest_timestamp(&self) -> Result<Option<Timestamp>> {
        Ok(self.tail_state()?.latest)
    }
}
