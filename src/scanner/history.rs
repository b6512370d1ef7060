// SPDX-License-Identifier: GPL-3.0-only

//! Time-windowed duplicate suppression

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Recently emitted values
#[derive(Debug)]
pub struct ScanHistory {
    window: Duration,
    last_seen: HashMap<String, Instant>,
}

impl ScanHistory {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether `value` may be emitted at `now`
    ///
    /// Returns `false` while the value was accepted less than one window ago.
    /// Otherwise the value is recorded as seen at `now` and `true` returned.
    pub fn accept(&mut self, value: &str, now: Instant) -> bool {
        if let Some(seen) = self.last_seen.get(value) {
            if now.saturating_duration_since(*seen) < self.window {
                return false;
            }
        }
        self.last_seen.insert(value.to_string(), now);
        true
    }

    /// Drop entries older than the window
    pub fn sweep(&mut self, now: Instant) {
        let window = self.window;
        let before = self.last_seen.len();
        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);
        let removed = before - self.last_seen.len();
        if removed > 0 {
            trace!(removed, "Swept scan history");
        }
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.last_seen.contains_key(value)
    }

    pub fn clear(&mut self) {
        self.last_seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(2000);

    #[tokio::test(start_paused = true)]
    async fn test_window_boundaries() {
        let mut history = ScanHistory::new(WINDOW);
        let t0 = Instant::now();

        assert!(history.accept("01234565", t0));
        assert!(!history.accept("01234565", t0 + Duration::from_millis(500)));
        assert!(!history.accept("01234565", t0 + Duration::from_millis(1999)));
        assert!(history.accept("01234565", t0 + Duration::from_millis(2000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_reads_do_not_extend_window() {
        let mut history = ScanHistory::new(WINDOW);
        let t0 = Instant::now();

        assert!(history.accept("a", t0));
        assert!(!history.accept("a", t0 + Duration::from_millis(1500)));
        assert!(history.accept("a", t0 + Duration::from_millis(2100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_values_are_independent() {
        let mut history = ScanHistory::new(WINDOW);
        let t0 = Instant::now();

        assert!(history.accept("a", t0));
        assert!(history.accept("b", t0));
        assert!(!history.accept("a", t0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_only_expired_entries() {
        let mut history = ScanHistory::new(WINDOW);
        let t0 = Instant::now();

        history.accept("old", t0);
        history.accept("new", t0 + Duration::from_millis(1500));
        history.sweep(t0 + Duration::from_millis(2000));

        assert!(!history.contains("old"));
        assert!(history.contains("new"));
        assert_eq!(history.len(), 1);
    }
}
