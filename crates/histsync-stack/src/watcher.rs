use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use histsync_log::{FileHistoryLog, LogRevision};
use histsync_processor::StoreCoordinator;

use crate::error::{Result, StackError};

/// Polls the shared log file and raises a remote-change signal whenever
/// another process has written to it.
///
/// Signals are delivered on a blocking thread, so merge cycles never run on
/// the async executor.
pub struct LogWatcher {
    log: Arc<FileHistoryLog>,
    coordinator: StoreCoordinator,
    interval: Duration,
}

impl LogWatcher {
    pub fn new(log: Arc<FileHistoryLog>, coordinator: StoreCoordinator, interval: Duration) -> Self {
        Self {
            log,
            coordinator,
            interval,
        }
    }

    /// Run on the current tokio runtime until the returned handle is shut
    /// down. Writes made after this call are guaranteed to be noticed.
    pub fn spawn(self) -> Result<WatcherHandle> {
        let baseline = self.log.revision()?;
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.poll(baseline, rx));
        Ok(WatcherHandle { shutdown, task })
    }

    /// Poll until `shutdown` turns `true` or its sender is dropped. Returns
    /// the number of change signals raised.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<usize> {
        let baseline = self.log.revision()?;
        self.poll(baseline, shutdown).await
    }

    async fn poll(self, mut last: LogRevision, mut shutdown: watch::Receiver<bool>) -> Result<usize> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut signals = 0;
        info!(path = %self.log.path().display(), interval_ms = self.interval.as_millis() as u64, "log watcher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let current = match self.log.revision() {
                Ok(revision) => revision,
                Err(e) => {
                    warn!(error = %e, "history log revision unavailable");
                    continue;
                }
            };
            if current == last {
                continue;
            }
            last = current;

            let coordinator = self.coordinator.clone();
            match tokio::task::spawn_blocking(move || coordinator.notify_remote_change()).await {
                Ok(subscribers) => {
                    signals += 1;
                    debug!(len = current.len, subscribers, "history log changed");
                }
                Err(e) => warn!(error = %e, "remote change delivery failed"),
            }
        }

        info!(signals, "log watcher stopped");
        Ok(signals)
    }
}

/// Handle to a spawned [`LogWatcher`].
pub struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<usize>>,
}

impl WatcherHandle {
    /// Stop the watcher and wait for it to finish.
    pub async fn shutdown(self) -> Result<usize> {
        // A send error means the task already exited.
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| StackError::Watcher(e.to_string()))?
    }
}
