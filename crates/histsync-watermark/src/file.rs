//! Crash-durable watermark store shared between processes.
//!
//! [`FileWatermarkStore`] keeps one small JSON document per originator in a
//! directory every participating process can reach:
//!
//! ```text
//! {dir}/lastHistoryTransactionTimeStamp-{originator}.json
//! ```
//!
//! Writes go to a temporary file in the same directory, are synced, then
//! atomically renamed over the target. A reader therefore sees either the
//! old or the new watermark, never a torn one, and a watermark that was
//! acknowledged survives a crash. Each originator writes only its own file
//! during merge, so concurrent writers never contend on the same entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use histsync_types::{OriginatorId, Timestamp};

use crate::error::{Result, WatermarkError};
use crate::keys::watermark_key;
use crate::traits::WatermarkStore;

/// On-disk representation of a single watermark.
#[derive(Debug, Serialize, Deserialize)]
struct WatermarkDocument {
    originator: OriginatorId,
    timestamp: Timestamp,
}

/// A directory-backed implementation of [`WatermarkStore`].
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    dir: PathBuf,
}

impl FileWatermarkStore {
    /// Open (or create) a watermark directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the watermark documents.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, originator: &OriginatorId) -> PathBuf {
        self.dir.join(format!("{}.json", watermark_key(originator)))
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn get(&self, originator: &OriginatorId) -> Result<Option<Timestamp>> {
        let path = self.entry_path(originator);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let doc: WatermarkDocument =
            serde_json::from_slice(&bytes).map_err(|e| WatermarkError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if &doc.originator != originator {
            return Err(WatermarkError::Corrupt {
                path,
                reason: format!("entry belongs to {}", doc.originator),
            });
        }

        Ok(Some(doc.timestamp))
    }

    fn set(&self, originator: &OriginatorId, watermark: Option<Timestamp>) -> Result<()> {
        let path = self.entry_path(originator);

        let Some(timestamp) = watermark else {
            match fs::remove_file(&path) {
                Ok(()) => debug!(%originator, "watermark cleared"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        };

        let doc = WatermarkDocument {
            originator: originator.clone(),
            timestamp,
        };
        let encoded = serde_json::to_vec_pretty(&doc)
            .map_err(|e| WatermarkError::Serialization(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| WatermarkError::Io(e.error))?;

        debug!(%originator, %timestamp, "watermark persisted");
        Ok(())
    }
}
