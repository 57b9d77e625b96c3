//! Periodic progress logging.
//!
//! A [`ProgressTracker`] counts items and logs a line every time the count
//! crosses a multiple of its interval. The count is atomic, so one tracker can
//! be shared by workers that each decode their own range.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging::format_count;

/// Default number of items between log lines.
pub const DEFAULT_INTERVAL: u64 = 10_000;

/// Counts items and logs at interval boundaries.
///
/// ```
/// use shardseq_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Decoded records").with_interval(100);
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Decoded records 250 (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Tracker with a count of zero and an interval of [`DEFAULT_INTERVAL`].
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: DEFAULT_INTERVAL, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Sets the interval; zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` to the count, logging once per interval boundary
    /// crossed. Returns `true` when the new count is an exact multiple of the
    /// interval.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let count = prev + additional;

        for milestone in (prev / self.interval + 1..=count / self.interval).map(|i| i * self.interval) {
            info!("{} {}", self.message, format_count(milestone));
        }

        count > 0 && count.is_multiple_of(self.interval)
    }

    /// Logs the final count unless the last boundary already reported it.
    pub fn log_final(&self) {
        let count = self.count();
        if count > 0 && !count.is_multiple_of(self.interval) {
            info!("{} {} (complete)", self.message, format_count(count));
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
