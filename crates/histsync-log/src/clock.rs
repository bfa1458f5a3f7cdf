use std::sync::Mutex;

use histsync_types::timestamp::wall_clock_ms;
use histsync_types::Timestamp;

/// Internal mutable state of the clock.
struct ClockState {
    /// Last-issued or last-observed physical millisecond.
    physical_ms: u64,
    /// Logical counter for entries within the same physical millisecond.
    logical: u32,
}

/// Hybrid logical clock stamping history log appends.
///
/// Combines wall-clock time with a logical counter so that every issued
/// [`Timestamp`] is strictly greater than any timestamp previously issued or
/// observed. Safe for concurrent use across threads via an internal
/// [`Mutex`].
///
/// # Rules
///
/// - **Issue**: `physical = max(wall_clock, state.physical)`.
///   If physical advanced, `logical = 0`; otherwise `logical += 1`.
/// - **Observe**: if the observed timestamp is ahead of the state, adopt it,
///   so the next issued timestamp lands after it.
pub struct HistoryClock {
    state: Mutex<ClockState>,
}

impl HistoryClock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    /// Issue a timestamp for a new log entry.
    pub fn now(&self) -> Timestamp {
        self.issue(wall_clock_ms())
    }

    /// Record a timestamp seen in the log (e.g. written by another process).
    pub fn observe(&self, seen: Timestamp) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let current = Timestamp::new(state.physical_ms, state.logical);
        if seen > current {
            state.physical_ms = seen.physical_ms;
            state.logical = seen.logical;
        }
    }

    fn issue(&self, wall_ms: u64) -> Timestamp {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        let new_physical = wall_ms.max(state.physical_ms);
        let next = if new_physical > state.physical_ms {
            // Physical clock advanced; reset logical counter.
            Timestamp::new(new_physical, 0)
        } else {
            Timestamp::new(state.physical_ms, state.logical).successor()
        };

        state.physical_ms = next.physical_ms;
        state.logical = next.logical;
        next
    }
}

impl Default for HistoryClock {
    fn default() -> Self {
        Self::new()
    }
}
