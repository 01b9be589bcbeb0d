//! Strictly increasing nanosecond stamps for subscription and artifact names.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Issues wall-clock nanosecond stamps that never repeat within a process,
/// even when two calls land in the same clock tick.
#[derive(Debug, Default)]
pub struct MonotonicStamp {
    last: AtomicU64,
}

impl MonotonicStamp {
    /// Creates a new stamp source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next stamp: the current time in nanoseconds, or one past the last
    /// stamp if the clock has not advanced.
    pub fn next(&self) -> u64 {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .map(|n| n.max(0) as u64)
            .unwrap_or(0);
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev + 1)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_stamps_strictly_increase() {
        let stamp = MonotonicStamp::new();
        let issued: Vec<u64> = (0..1000).map(|_| stamp.next()).collect();
        assert!(issued.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(issued.iter().collect::<HashSet<_>>().len(), issued.len());
    }
}
