use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use histsync_log::{FetchFilter, HistoryLog};
use histsync_types::{Originator, OriginatorId, Timestamp};
use histsync_watermark::WatermarkStore;

use crate::bridge::ContextBridge;
use crate::coordinator::{StoreCoordinator, Subscription};
use crate::error::{Result, SyncError};
use crate::report::{CycleReport, MergeOutcome, PruneOutcome};
use crate::roster::validate_roster;

/// Where a processor is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed; `setup()` has not been called yet.
    Unconfigured,
    /// Wired to a context, a log and a coordinator.
    Ready,
}

/// Dependencies installed by `setup()`.
struct Wiring {
    target: Arc<dyn ContextBridge>,
    log: Arc<dyn HistoryLog>,
    _subscription: Subscription,
}

/// Holds the `processing` flag up for its lifetime, unwinding included.
struct ProcessingFlag<'a>(&'a AtomicBool);

impl<'a> ProcessingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for ProcessingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Merges other writers' history into one context and prunes the shared log.
///
/// Holds the state mutex for the whole of a cycle, so signals arriving while
/// a cycle runs block until it completes and then run their own cycle.
pub struct HistoryMergeProcessor {
    current: Originator,
    watermarks: Arc<dyn WatermarkStore>,
    wiring: Mutex<Option<Wiring>>,
    processing: AtomicBool,
}

impl HistoryMergeProcessor {
    /// Create a processor for `current`.
    ///
    /// Fails with [`SyncError::DuplicateOriginatorIdentifier`] if the roster
    /// repeats an identifier, or [`SyncError::OriginatorNotInRoster`] if the
    /// current originator is not listed.
    pub fn new(current: Originator, watermarks: Arc<dyn WatermarkStore>) -> Result<Self> {
        validate_roster(&current)?;
        Ok(Self {
            current,
            watermarks,
            wiring: Mutex::new(None),
            processing: AtomicBool::new(false),
        })
    }

    /// Wire the processor to its target context and the shared log, and
    /// subscribe to `coordinator`.
    ///
    /// Calling `setup` again replaces the previous wiring and subscription.
    /// The subscription holds only a weak reference; once the last `Arc` to
    /// the processor is dropped, signals are ignored.
    pub fn setup(
        self: &Arc<Self>,
        target: Arc<dyn ContextBridge>,
        log: Arc<dyn HistoryLog>,
        coordinator: &StoreCoordinator,
    ) {
        let weak = Arc::downgrade(self);
        let subscription = coordinator.subscribe(move |change| {
            if let Some(processor) = weak.upgrade() {
                debug!(sequence = change.sequence, "remote change signal");
                processor.handle_signal();
            }
        });

        let replaced = {
            let mut wiring = self.wiring.lock().unwrap_or_else(PoisonError::into_inner);
            wiring.replace(Wiring {
                target,
                log,
                _subscription: subscription,
            })
        };
        // Old subscription unregisters here, outside the state lock.
        drop(replaced);

        debug!(originator = %self.current.id(), "history processor ready");
    }

    /// The originator this processor merges for.
    pub fn originator(&self) -> &Originator {
        &self.current
    }

    pub fn lifecycle(&self) -> Lifecycle {
        let wiring = self.wiring.lock().unwrap_or_else(PoisonError::into_inner);
        if wiring.is_some() {
            Lifecycle::Ready
        } else {
            Lifecycle::Unconfigured
        }
    }

    /// Returns `true` while a cycle is running.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Run one merge-then-prune cycle.
    ///
    /// Step failures are reported in the [`CycleReport`]; the only error
    /// returned directly is [`SyncError::NotConfigured`].
    pub fn process(&self) -> Result<CycleReport> {
        let wiring = self.wiring.lock().unwrap_or_else(PoisonError::into_inner);
        let wiring = wiring.as_ref().ok_or(SyncError::NotConfigured)?;

        let _processing = ProcessingFlag::raise(&self.processing);
        let merge = match self.merge(wiring) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(originator = %self.current.id(), error = %e, "history merge failed");
                MergeOutcome::Failed(e)
            }
        };
        let prune = match self.prune(wiring) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(originator = %self.current.id(), error = %e, "history prune failed");
                PruneOutcome::Failed(e)
            }
        };

        Ok(CycleReport { merge, prune })
    }

    fn handle_signal(&self) {
        match self.process() {
            Ok(report) => debug!(originator = %self.current.id(), %report, "history cycle complete"),
            Err(e) => warn!(originator = %self.current.id(), error = %e, "history cycle skipped"),
        }
    }

    fn merge(&self, wiring: &Wiring) -> Result<MergeOutcome> {
        let me = self.current.id();
        let from = Timestamp::or_zero(self.watermarks.get(me)?);
        let filter = FetchFilter::excluding(me.clone(), wiring.target.context_name());

        let history = wiring
            .log
            .fetch_after(from, &filter)
            .map_err(SyncError::HistoryFetchFailed)?;

        let Some(last) = history.last().map(|tx| tx.timestamp) else {
            info!(originator = %me, "no history transactions to merge");
            return Ok(MergeOutcome::NothingToMerge);
        };

        info!(originator = %me, count = history.len(), "merging history transactions");
        for tx in &history {
            wiring
                .target
                .apply(tx)
                .map_err(|source| SyncError::ApplyFailed { id: tx.id, source })?;
        }

        self.watermarks.set(me, Some(last))?;
        Ok(MergeOutcome::Merged {
            count: history.len(),
            watermark: last,
        })
    }

    fn prune(&self, wiring: &Wiring) -> Result<PruneOutcome> {
        let roster = self.current.roster();
        let watermarks = self.watermarks.get_all(roster)?;

        let Some(cutoff) = common_timestamp(&watermarks) else {
            info!(originator = %self.current.id(), "no common transaction timestamp, skipping");
            return Ok(PruneOutcome::NoCommonPoint);
        };

        info!(originator = %self.current.id(), %cutoff, "deleting history using common timestamp");
        let removed = wiring
            .log
            .delete_before(cutoff)
            .map_err(SyncError::DeleteFailed)?;

        self.watermarks.reset_all(roster)?;
        Ok(PruneOutcome::Pruned { cutoff, removed })
    }
}

/// The point every originator has merged past, if there is one.
///
/// A missing watermark counts as the distant past, so any `None` (or an
/// empty roster) yields `None`.
pub fn common_timestamp(watermarks: &[(OriginatorId, Option<Timestamp>)]) -> Option<Timestamp> {
    watermarks
        .iter()
        .map(|(_, watermark)| Timestamp::or_zero(*watermark))
        .min()
        .filter(|min| !min.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> OriginatorId {
        OriginatorId::new(s).unwrap()
    }

    fn ms(v: u64) -> Option<Timestamp> {
        Some(Timestamp::from_millis(v))
    }

    #[test]
    fn common_timestamp_is_the_minimum() {
        let marks = vec![(id("a"), ms(5)), (id("b"), ms(8))];
        assert_eq!(common_timestamp(&marks), ms(5));
    }

    #[test]
    fn any_missing_watermark_means_no_common_point() {
        let marks = vec![(id("a"), None), (id("b"), ms(7))];
        assert_eq!(common_timestamp(&marks), None);
    }

    #[test]
    fn zero_watermark_means_no_common_point() {
        let marks = vec![(id("a"), Some(Timestamp::zero())), (id("b"), ms(7))];
        assert_eq!(common_timestamp(&marks), None);
    }

    #[test]
    fn empty_roster_has_no_common_point() {
        assert_eq!(common_timestamp(&[]), None);
    }
}
