//! Reservation sources and the offset/limit pagination loop.

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::{debug, info, warn};
use turnover_core::DateRange;

use crate::types::RawReservation;

/// Filter forwarded to the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationQuery {
    pub status: Option<String>,
    pub check_in: Option<DateRange>,
}

#[async_trait]
pub trait ReservationSource: Send + Sync {
    /// Fetch one page. A page shorter than `limit` ends the listing.
    async fn fetch_page(
        &self,
        query: &ReservationQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawReservation>>;
}

#[async_trait]
impl<S: ReservationSource + ?Sized> ReservationSource for Box<S> {
    async fn fetch_page(
        &self,
        query: &ReservationQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawReservation>> {
        (**self).fetch_page(query, offset, limit).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: usize,
    /// Safety stop for feeds that never return a short page.
    pub max_pages: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 10,
        }
    }
}

/// Walk pages until a short page or the page cap.
pub async fn fetch_all<S: ReservationSource + ?Sized>(
    source: &S,
    query: &ReservationQuery,
    limits: PageLimits,
) -> Result<Vec<RawReservation>> {
    if limits.page_size == 0 {
        bail!("page_size must be at least 1");
    }

    let mut all = Vec::new();
    let mut offset = 0;

    for page in 0..limits.max_pages {
        let batch = source.fetch_page(query, offset, limits.page_size).await?;
        let n = batch.len();
        debug!(page, offset, fetched = n, "reservation page");
        all.extend(batch);

        if n < limits.page_size {
            info!(total = all.len(), pages = page + 1, "reservations fetched");
            return Ok(all);
        }
        offset += limits.page_size;
    }

    warn!(
        total = all.len(),
        max_pages = limits.max_pages,
        "page cap reached before a short page; listing may be truncated"
    );
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CamelReservation;
    use std::sync::Mutex;

    struct Fixed {
        total: usize,
        calls: Mutex<Vec<(usize, usize)>>,
    }

    #[async_trait]
    impl ReservationSource for Fixed {
        async fn fetch_page(
            &self,
            _query: &ReservationQuery,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<RawReservation>> {
            self.calls.lock().unwrap().push((offset, limit));
            let end = (offset + limit).min(self.total);
            Ok((offset..end)
                .map(|i| {
                    RawReservation::Camel(CamelReservation {
                        id: Some(crate::types::RawId::Number(i as i64)),
                        check_in: "2025-08-01".to_string(),
                        check_out: Some("2025-08-02".to_string()),
                        guest_name: None,
                        cleaning_required: None,
                        status: None,
                    })
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn stops_on_short_page() {
        let src = Fixed {
            total: 250,
            calls: Mutex::new(vec![]),
        };
        let out = fetch_all(&src, &ReservationQuery::default(), PageLimits::default())
            .await
            .unwrap();
        assert_eq!(out.len(), 250);
        assert_eq!(*src.calls.lock().unwrap(), vec![(0, 100), (100, 100), (200, 100)]);
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let src = Fixed {
            total: 200,
            calls: Mutex::new(vec![]),
        };
        let out = fetch_all(&src, &ReservationQuery::default(), PageLimits::default())
            .await
            .unwrap();
        assert_eq!(out.len(), 200);
        assert_eq!(src.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn page_cap_bounds_the_loop() {
        let src = Fixed {
            total: 10_000,
            calls: Mutex::new(vec![]),
        };
        let limits = PageLimits {
            page_size: 50,
            max_pages: 2,
        };
        let out = fetch_all(&src, &ReservationQuery::default(), limits).await.unwrap();
        assert_eq!(out.len(), 100);
    }
}
