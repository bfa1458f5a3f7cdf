use std::sync::Arc;

use tracing::info;

use histsync_log::{FileHistoryLog, HistoryLog};
use histsync_processor::{CycleReport, HistoryMergeProcessor, StoreCoordinator};
use histsync_types::{ChangeSet, ContextName, OriginatorId, Timestamp, Transaction};
use histsync_watermark::{FileWatermarkStore, WatermarkStore};

use crate::config::SyncConfig;
use crate::context::RecordContext;
use crate::error::Result;
use crate::watcher::LogWatcher;

/// Everything one writer process needs to take part in synchronization.
pub struct SyncStack {
    config: SyncConfig,
    log: Arc<FileHistoryLog>,
    watermarks: Arc<FileWatermarkStore>,
    coordinator: StoreCoordinator,
    main: Arc<RecordContext>,
    background: Arc<RecordContext>,
    processor: Arc<HistoryMergeProcessor>,
}

/// Point-in-time view of the shared state.
#[derive(Clone, Debug)]
pub struct StackStatus {
    pub originator: OriginatorId,
    pub watermarks: Vec<(OriginatorId, Option<Timestamp>)>,
    pub log_len: usize,
    pub latest: Option<Timestamp>,
}

impl SyncStack {
    /// Open the shared log and watermark store, build both contexts and set
    /// up the merge processor against the background context.
    pub fn open(config: SyncConfig) -> Result<Self> {
        config.validate()?;

        let log = Arc::new(FileHistoryLog::open(&config.log_path(), config.log_config())?);
        let watermarks = Arc::new(FileWatermarkStore::open(config.watermark_path())?);
        let coordinator = StoreCoordinator::new();

        let name = ContextName::for_originator(&config.originator);
        let main = Arc::new(RecordContext::new(
            name.clone(),
            config.originator.clone(),
            log.clone(),
            coordinator.clone(),
        ));
        let background = Arc::new(RecordContext::new(
            name,
            config.originator.clone(),
            log.clone(),
            coordinator.clone(),
        ));
        main.link(&background);

        let processor = Arc::new(HistoryMergeProcessor::new(
            config.current_originator(),
            watermarks.clone(),
        )?);
        processor.setup(background.clone(), log.clone(), &coordinator);

        info!(
            originator = %config.originator,
            log = %config.log_path().display(),
            "sync stack opened"
        );
        Ok(Self {
            config,
            log,
            watermarks,
            coordinator,
            main,
            background,
            processor,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn main_context(&self) -> &Arc<RecordContext> {
        &self.main
    }

    pub fn background_context(&self) -> &Arc<RecordContext> {
        &self.background
    }

    pub fn processor(&self) -> &Arc<HistoryMergeProcessor> {
        &self.processor
    }

    pub fn coordinator(&self) -> &StoreCoordinator {
        &self.coordinator
    }

    pub fn log(&self) -> &Arc<FileHistoryLog> {
        &self.log
    }

    /// Save through the main context.
    pub fn save(&self, changes: ChangeSet) -> Result<Option<Transaction>> {
        Ok(self.main.save(changes)?)
    }

    /// Run one merge-then-prune cycle now.
    pub fn process(&self) -> Result<CycleReport> {
        Ok(self.processor.process()?)
    }

    pub fn status(&self) -> Result<StackStatus> {
        Ok(StackStatus {
            originator: self.config.originator.clone(),
            watermarks: self.watermarks.get_all(&self.config.roster)?,
            log_len: self.log.len()?,
            latest: self.log.latest_timestamp()?,
        })
    }

    /// Entries currently in the shared log.
    pub fn history(&self) -> Result<Vec<Transaction>> {
        Ok(self.log.read_all()?)
    }

    /// A watcher polling this stack's log at the configured interval.
    pub fn watcher(&self) -> LogWatcher {
        LogWatcher::new(
            self.log.clone(),
            self.coordinator.clone(),
            self.config.poll_interval(),
        )
    }
}
