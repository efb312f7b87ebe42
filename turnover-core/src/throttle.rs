//! Minimum interval between booking refetches.
//!
//! Lifecycle: created once at startup by whoever owns the fetch path,
//! `try_acquire` before each fetch (`mark` when the fetch is unconditional),
//! `reset` to force the next fetch through.
//! Time is passed in so behaviour is deterministic under test.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct FetchThrottle {
    min_interval: Duration,
    last_fetch: Option<DateTime<Utc>>,
}

impl FetchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_fetch: None,
        }
    }

    /// Record a fetch at `now` and return true, or return false when the
    /// previous fetch is still inside the interval.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        match self.last_fetch {
            Some(last) if now - last < self.min_interval => false,
            _ => {
                self.last_fetch = Some(now);
                true
            }
        }
    }

    /// Record a fetch at `now` regardless of the interval.
    pub fn mark(&mut self, now: DateTime<Utc>) {
        self.last_fetch = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_fetch = None;
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.last_fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blocks_inside_interval_and_reset_reopens() {
        let t0 = Utc.with_ymd_and_hms(2025, 8, 1, 10, 0, 0).unwrap();
        let mut th = FetchThrottle::new(Duration::seconds(5));

        assert!(th.try_acquire(t0));
        assert!(!th.try_acquire(t0 + Duration::seconds(4)));
        assert!(th.try_acquire(t0 + Duration::seconds(5)));

        th.reset();
        assert!(th.try_acquire(t0 + Duration::seconds(6)));
        assert_eq!(th.last_fetch(), Some(t0 + Duration::seconds(6)));
    }

    #[test]
    fn mark_starts_the_interval_even_inside_it() {
        let t0 = Utc.with_ymd_and_hms(2025, 8, 1, 10, 0, 0).unwrap();
        let mut th = FetchThrottle::new(Duration::seconds(5));

        assert!(th.try_acquire(t0));
        th.mark(t0 + Duration::seconds(3));
        assert_eq!(th.last_fetch(), Some(t0 + Duration::seconds(3)));
        assert!(!th.try_acquire(t0 + Duration::seconds(7)));
        assert!(th.try_acquire(t0 + Duration::seconds(8)));
    }
}
