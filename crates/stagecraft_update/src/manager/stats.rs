//! Rolling update-time statistics.

use std::time::Duration;

use stagecraft_core::CircularQueue;

/// The most recent update durations, oldest first.
#[derive(Clone, Debug)]
pub struct FrameStats {
    window: CircularQueue<Duration>,
    frames_recorded: u64,
}

impl FrameStats {
    /// Keeps the last `window` durations.
    ///
    /// # Panics
    ///
    /// Panics if `window` is zero.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            window: CircularQueue::new(window),
            frames_recorded: 0,
        }
    }

    /// Records one update, evicting the oldest once the window is full.
    pub fn record(&mut self, duration: Duration) {
        if self.window.is_full() {
            self.window.pop_front();
        }
        // Cannot fail: a slot was just freed.
        let _ = self.window.push_back(duration);
        self.frames_recorded += 1;
    }

    /// Updates recorded since creation.
    #[must_use]
    pub const fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    /// Durations currently in the window.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns `true` before the first update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Most recent duration.
    #[must_use]
    pub fn last(&self) -> Option<Duration> {
        self.window.back().copied()
    }

    /// Longest duration in the window.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        self.window.iter().max().copied()
    }

    /// Mean duration over the window.
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        let count = u32::try_from(self.window.len()).ok().filter(|n| *n > 0)?;
        let total: Duration = self.window.iter().sum();
        Some(total / count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_keeps_latest() {
        let mut stats = FrameStats::new(20);
        for ms in 1..=25 {
            stats.record(Duration::from_millis(ms));
        }
        assert_eq!(stats.len(), 20);
        assert_eq!(stats.frames_recorded(), 25);
        assert_eq!(stats.last(), Some(Duration::from_millis(25)));
        assert_eq!(stats.max(), Some(Duration::from_millis(25)));
        // 6..=25
        assert_eq!(stats.average(), Some(Duration::from_micros(15_500)));
    }

    #[test]
    fn test_empty() {
        let stats = FrameStats::new(4);
        assert!(stats.is_empty());
        assert_eq!(stats.average(), None);
        assert_eq!(stats.last(), None);
    }
}
