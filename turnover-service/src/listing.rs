//! Calendar listing. The one read path that fails soft: a degraded store
//! yields an empty list plus the error, so the calendar stays usable.

use serde::Serialize;
use tracing::error;
use turnover_core::{CleaningTask, Month};

use crate::store::{TaskQuery, TaskStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub tasks: Vec<CleaningTask>,
    /// Set when the store read failed; `tasks` is then empty.
    pub error: Option<String>,
}

impl Listing {
    /// Empty listing carrying why nothing could be read.
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            tasks: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Tasks whose current cleaning date falls in `month`, by date then id.
pub async fn list_month(store: &dyn TaskStore, month: Month) -> Listing {
    match store.query(&TaskQuery::CleaningDateBetween(month.range())).await {
        Ok(tasks) => Listing { tasks, error: None },
        Err(e) => {
            error!(%month, error = %e, "calendar listing failed, returning empty");
            Listing::degraded(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTaskStore;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn lists_by_current_date_and_degrades_softly() {
        let store = InMemoryTaskStore::new();
        let mut moved = CleaningTask::skeleton(d("2025-07-31"), "a", "A");
        moved.schedule_on(d("2025-08-02"));
        store.insert(moved).await;
        store.insert(CleaningTask::skeleton(d("2025-08-01"), "b", "B")).await;
        store.insert(CleaningTask::skeleton(d("2025-09-01"), "c", "C")).await;

        let aug: Month = "2025-08".parse().unwrap();
        let listing = list_month(&store, aug).await;
        let ids: Vec<_> = listing.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2025-08-01_b", "2025-07-31_a"]);

        store.set_reads_down(true);
        let listing = list_month(&store, aug).await;
        assert!(listing.is_degraded());
        assert!(listing.tasks.is_empty());
    }
}
