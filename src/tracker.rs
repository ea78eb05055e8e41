//! Client-side tracking of the daemon's `Modified` timestamps.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A monotonic high-water mark over the `Modified` property of a collection
/// or item, scoped to one client handle.
///
/// The first observation seeds the mark without reporting a change (the
/// daemon's value cannot be distinguished from "unchanged since before we
/// looked"). Afterwards a change is reported iff the freshly read value is
/// strictly later than the mark, and the mark never moves backwards even if
/// the daemon reports an earlier time.
#[derive(Debug, Default)]
pub struct ModifiedTracker {
    mark: Mutex<Option<u64>>,
}

impl ModifiedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly read `Modified` value (seconds since the epoch)
    /// and reports whether it is a change relative to the previous mark.
    pub fn observe(&self, modified: u64) -> bool {
        let mut mark = self.mark.lock().unwrap_or_else(|e| e.into_inner());
        match *mark {
            None => {
                *mark = Some(modified);
                false
            }
            Some(previous) => {
                let changed = modified > previous;
                if changed {
                    *mark = Some(modified);
                }
                changed
            }
        }
    }
}

/// Seconds since the Unix epoch, saturating at zero for pre-epoch times.
pub fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The `SystemTime` for a daemon-reported epoch-seconds timestamp.
pub fn time_from_epoch(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_seeds_without_change() {
        let tracker = ModifiedTracker::new();
        assert!(!tracker.observe(1_700_000_000));
    }

    #[test]
    fn identical_reread_is_not_a_change() {
        let tracker = ModifiedTracker::new();
        tracker.observe(1_700_000_000);
        assert!(!tracker.observe(1_700_000_000));
        assert!(!tracker.observe(1_700_000_000));
    }

    #[test]
    fn strictly_later_value_is_a_change() {
        let tracker = ModifiedTracker::new();
        tracker.observe(1_700_000_000);
        assert!(tracker.observe(1_700_000_001));
        // The mark advanced, so re-reading the same value is quiet again.
        assert!(!tracker.observe(1_700_000_001));
    }

    #[test]
    fn mark_never_regresses() {
        let tracker = ModifiedTracker::new();
        tracker.observe(1_700_000_100);
        assert!(!tracker.observe(1_700_000_050));
        // An earlier report did not lower the mark.
        assert!(!tracker.observe(1_700_000_100));
        assert!(tracker.observe(1_700_000_101));
    }

    #[test]
    fn epoch_conversions_round_trip() {
        let now = 1_700_000_000u64;
        assert_eq!(epoch_secs(time_from_epoch(now)), now);
        assert_eq!(epoch_secs(UNIX_EPOCH), 0);
    }
}
