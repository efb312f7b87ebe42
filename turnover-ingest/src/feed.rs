//! Throttled, normalized booking snapshot over any reservation source.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use turnover_core::FetchThrottle;

use crate::normalize::{NormalizedSnapshot, Normalizer};
use crate::source::{PageLimits, ReservationQuery, ReservationSource, fetch_all};

pub const DEFAULT_MIN_REFETCH_SECS: i64 = 5;

pub struct BookingFeed<S> {
    source: S,
    query: ReservationQuery,
    limits: PageLimits,
    normalizer: Normalizer,
    throttle: FetchThrottle,
    cached: Option<NormalizedSnapshot>,
}

impl<S: ReservationSource> BookingFeed<S> {
    pub fn new(source: S) -> Result<Self> {
        Ok(Self {
            source,
            query: ReservationQuery::default(),
            limits: PageLimits::default(),
            normalizer: Normalizer::new()?,
            throttle: FetchThrottle::new(Duration::seconds(DEFAULT_MIN_REFETCH_SECS)),
            cached: None,
        })
    }

    pub fn with_query(mut self, query: ReservationQuery) -> Self {
        self.query = query;
        self
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_min_refetch(mut self, interval: Duration) -> Self {
        self.throttle = FetchThrottle::new(interval);
        self
    }

    /// Current booking snapshot. Inside the refetch interval the previous
    /// snapshot is returned without touching the source.
    pub async fn snapshot(&mut self, now: DateTime<Utc>) -> Result<NormalizedSnapshot> {
        if let Some(cached) = &self.cached {
            if !self.throttle.try_acquire(now) {
                debug!("booking snapshot served from cache");
                return Ok(cached.clone());
            }
        } else {
            // Nothing cached yet, so this fetch happens either way.
            self.throttle.mark(now);
        }

        let raws = match fetch_all(&self.source, &self.query, self.limits).await {
            Ok(r) => r,
            Err(e) => {
                // a failed fetch must not hold the slot
                self.throttle.reset();
                return Err(e);
            }
        };
        let snap = self.normalizer.normalize_all(&raws);
        info!(
            bookings = snap.bookings.len(),
            rejected = snap.rejected.len(),
            "booking snapshot refreshed"
        );
        self.cached = Some(snap.clone());
        Ok(snap)
    }

    /// Force the next `snapshot` call through to the source.
    pub fn invalidate(&mut self) {
        self.throttle.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CamelReservation, RawId, RawReservation};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ReservationSource for Counting {
        async fn fetch_page(
            &self,
            _query: &ReservationQuery,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<RawReservation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("feed down");
            }
            Ok(vec![RawReservation::Camel(CamelReservation {
                id: Some(RawId::Text("b1".to_string())),
                check_in: "2025-08-07".to_string(),
                check_out: Some("2025-08-10".to_string()),
                guest_name: None,
                cleaning_required: None,
                status: None,
            })])
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn repeated_reads_inside_interval_hit_cache() {
        let mut feed = BookingFeed::new(Counting {
            calls: AtomicUsize::new(0),
            fail: false,
        })
        .unwrap();

        let a = feed.snapshot(t0()).await.unwrap();
        let b = feed.snapshot(t0() + Duration::seconds(2)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(feed.source.calls.load(Ordering::SeqCst), 1);

        feed.snapshot(t0() + Duration::seconds(6)).await.unwrap();
        assert_eq!(feed.source.calls.load(Ordering::SeqCst), 2);

        feed.invalidate();
        feed.snapshot(t0() + Duration::seconds(7)).await.unwrap();
        assert_eq!(feed.source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_fetch_starts_the_refetch_interval() {
        let mut feed = BookingFeed::new(Counting {
            calls: AtomicUsize::new(0),
            fail: false,
        })
        .unwrap();
        feed.throttle.mark(t0() - Duration::seconds(1));

        // Even with a recent mark, an empty cache forces the fetch.
        feed.snapshot(t0()).await.unwrap();
        assert_eq!(feed.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.throttle.last_fetch(), Some(t0()));
    }

    #[tokio::test]
    async fn failed_fetch_does_not_consume_the_slot() {
        let mut feed = BookingFeed::new(Counting {
            calls: AtomicUsize::new(0),
            fail: true,
        })
        .unwrap();
        assert!(feed.snapshot(t0()).await.is_err());
        assert!(feed.snapshot(t0() + Duration::seconds(1)).await.is_err());
        assert_eq!(feed.source.calls.load(Ordering::SeqCst), 2);
    }
}
