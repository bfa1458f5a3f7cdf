use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Hybrid logical timestamp of a log entry.
///
/// Combines a physical wall-clock component with a logical counter so that
/// several entries stamped within the same millisecond still order strictly.
///
/// Ordering: `physical_ms` → `logical` (total order). [`Timestamp::zero`] is
/// the lowest possible value and stands in for "never merged anything".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for entries at the same physical time.
    pub logical: u32,
}

impl Timestamp {
    /// Create a timestamp with explicit values.
    pub const fn new(physical_ms: u64, logical: u32) -> Self {
        Self {
            physical_ms,
            logical,
        }
    }

    /// Timestamp at the given millisecond with a zero logical counter.
    pub const fn from_millis(physical_ms: u64) -> Self {
        Self::new(physical_ms, 0)
    }

    /// Timestamp for the current wall-clock time.
    pub fn now() -> Self {
        Self::from_millis(wall_clock_ms())
    }

    /// The zero timestamp (distant past).
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Returns `true` if this is the zero timestamp.
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Resolve an optional watermark, treating `None` as the distant past.
    pub fn or_zero(watermark: Option<Self>) -> Self {
        watermark.unwrap_or_else(Self::zero)
    }

    /// The smallest timestamp strictly greater than this one.
    pub fn successor(&self) -> Self {
        match self.logical.checked_add(1) {
            Some(logical) => Self::new(self.physical_ms, logical),
            None => Self::new(self.physical_ms.saturating_add(1), 0),
        }
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this timestamp is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms.{})", self.physical_ms, self.logical)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.physical_ms, self.logical)
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ordering_physical_first() {
        let a = Timestamp::new(100, 5);
        let b = Timestamp::new(200, 0);
        assert!(a < b);
    }

    #[test]
    fn ordering_logical_second() {
        let a = Timestamp::new(100, 1);
        let b = Timestamp::new(100, 2);
        assert!(a < b);
        assert!(b.is_after(&a));
        assert!(a.is_before(&b));
    }

    #[test]
    fn zero_is_smallest() {
        let zero = Timestamp::zero();
        assert!(zero.is_zero());
        assert!(zero < Timestamp::new(0, 1));
        assert!(zero < Timestamp::from_millis(1));
    }

    #[test]
    fn missing_watermark_resolves_to_zero() {
        assert_eq!(Timestamp::or_zero(None), Timestamp::zero());
        assert_eq!(
            Timestamp::or_zero(Some(Timestamp::from_millis(7))),
            Timestamp::from_millis(7)
        );
    }

    #[test]
    fn successor_is_strictly_greater() {
        let ts = Timestamp::new(10, 3);
        assert_eq!(ts.successor(), Timestamp::new(10, 4));

        let saturated = Timestamp::new(10, u32::MAX);
        assert_eq!(saturated.successor(), Timestamp::new(11, 0));
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        let ts = Timestamp::now();
        // Should be after 2020-01-01 (1577836800000 ms)
        assert!(ts.physical_ms > 1_577_836_800_000);
        assert_eq!(ts.logical, 0);
    }

    #[test]
    fn serde_roundtrip() {
        let ts = Timestamp::new(1234567890, 42);
        let json = serde_json::to_string(&ts).unwrap();
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", Timestamp::new(1000, 5)), "1000.5");
        assert_eq!(format!("{:?}", Timestamp::new(1000, 5)), "Timestamp(1000ms.5)");
    }

    proptest! {
        #[test]
        fn successor_is_always_greater(ms in 0u64..u64::MAX, logical in any::<u32>()) {
            let ts = Timestamp::new(ms, logical);
            prop_assert!(ts.successor() > ts);
        }

        #[test]
        fn ordering_matches_tuple_ordering(a in any::<(u64, u32)>(), b in any::<(u64, u32)>()) {
            let ta = Timestamp::new(a.0, a.1);
            let tb = Timestamp::new(b.0, b.1);
            prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
        }
    }
}
