//! Cleaner directory and declared availability.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use turnover_core::{Availability, Cleaner, Month};

use crate::error::{StoreError, StoreResult};
use crate::json_file;

#[async_trait]
pub trait CleanerDirectory: Send + Sync {
    /// Every cleaner in roster order, active or not.
    async fn list_cleaners(&self) -> StoreResult<Vec<Cleaner>>;

    async fn get_cleaner(&self, id: &str) -> StoreResult<Option<Cleaner>> {
        Ok(self.list_cleaners().await?.into_iter().find(|c| c.id == id))
    }

    /// Replace the cleaner with the same id in place, or append a new one.
    async fn upsert_cleaner(&self, cleaner: Cleaner) -> StoreResult<Cleaner>;

    /// Soft delete. The record stays so past assignments keep resolving.
    async fn deactivate_cleaner(&self, id: &str) -> StoreResult<Cleaner>;
}

#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Declared dates; empty when the cleaner never submitted for `month`.
    async fn available_dates(&self, cleaner_id: &str, month: Month)
    -> StoreResult<BTreeSet<NaiveDate>>;

    /// Replace the cleaner's declaration for that month.
    async fn set_availability(&self, availability: Availability) -> StoreResult<()>;
}

/// Availability of every listed cleaner for one month.
pub async fn month_availability<A: AvailabilitySource + ?Sized>(
    source: &A,
    cleaners: &[Cleaner],
    month: Month,
) -> StoreResult<Vec<Availability>> {
    let mut out = Vec::with_capacity(cleaners.len());
    for c in cleaners {
        let dates = source.available_dates(&c.id, month).await?;
        out.push(Availability {
            cleaner_id: c.id.clone(),
            month,
            available_dates: dates,
        });
    }
    Ok(out)
}

fn upsert_in(cleaners: &mut Vec<Cleaner>, cleaner: Cleaner) -> Cleaner {
    match cleaners.iter_mut().find(|c| c.id == cleaner.id) {
        Some(existing) => *existing = cleaner.clone(),
        None => cleaners.push(cleaner.clone()),
    }
    cleaner
}

fn deactivate_in(cleaners: &mut [Cleaner], id: &str) -> StoreResult<Cleaner> {
    let c = cleaners
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    c.is_active = false;
    Ok(c.clone())
}

type AvailabilityKey = (String, Month);

#[derive(Debug, Default)]
pub struct InMemoryRoster {
    cleaners: RwLock<Vec<Cleaner>>,
    availability: RwLock<BTreeMap<AvailabilityKey, BTreeSet<NaiveDate>>>,
}

impl InMemoryRoster {
    pub fn new(cleaners: Vec<Cleaner>) -> Self {
        Self {
            cleaners: RwLock::new(cleaners),
            availability: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl CleanerDirectory for InMemoryRoster {
    async fn list_cleaners(&self) -> StoreResult<Vec<Cleaner>> {
        Ok(self.cleaners.read().await.clone())
    }

    async fn upsert_cleaner(&self, cleaner: Cleaner) -> StoreResult<Cleaner> {
        Ok(upsert_in(&mut *self.cleaners.write().await, cleaner))
    }

    async fn deactivate_cleaner(&self, id: &str) -> StoreResult<Cleaner> {
        deactivate_in(&mut self.cleaners.write().await, id)
    }
}

#[async_trait]
impl AvailabilitySource for InMemoryRoster {
    async fn available_dates(
        &self,
        cleaner_id: &str,
        month: Month,
    ) -> StoreResult<BTreeSet<NaiveDate>> {
        Ok(self
            .availability
            .read()
            .await
            .get(&(cleaner_id.to_string(), month))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_availability(&self, availability: Availability) -> StoreResult<()> {
        self.availability.write().await.insert(
            (availability.cleaner_id, availability.month),
            availability.available_dates,
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterFile {
    #[serde(default)]
    cleaners: Vec<Cleaner>,
    #[serde(default)]
    availability: Vec<Availability>,
}

/// Roster kept in one JSON file: `{"cleaners": [...], "availability": [...]}`.
/// Read on every call and edited under the file lock, like the task file.
#[derive(Debug)]
pub struct JsonFileRoster {
    path: PathBuf,
}

impl JsonFileRoster {
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        json_file::load::<RosterFile>(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<RosterFile> {
        json_file::load(&self.path).await
    }
}

#[async_trait]
impl CleanerDirectory for JsonFileRoster {
    async fn list_cleaners(&self) -> StoreResult<Vec<Cleaner>> {
        Ok(self.load().await?.cleaners)
    }

    async fn upsert_cleaner(&self, cleaner: Cleaner) -> StoreResult<Cleaner> {
        let saved = json_file::modify(&self.path, |data: &mut RosterFile| {
            Ok(upsert_in(&mut data.cleaners, cleaner))
        })
        .await?;
        info!(cleaner_id = %saved.id, active = saved.is_active, "cleaner saved");
        Ok(saved)
    }

    async fn deactivate_cleaner(&self, id: &str) -> StoreResult<Cleaner> {
        let saved = json_file::modify(&self.path, |data: &mut RosterFile| {
            deactivate_in(&mut data.cleaners, id)
        })
        .await?;
        info!(cleaner_id = %saved.id, "cleaner deactivated");
        Ok(saved)
    }
}

#[async_trait]
impl AvailabilitySource for JsonFileRoster {
    async fn available_dates(
        &self,
        cleaner_id: &str,
        month: Month,
    ) -> StoreResult<BTreeSet<NaiveDate>> {
        Ok(self
            .load()
            .await?
            .availability
            .into_iter()
            .find(|a| a.cleaner_id == cleaner_id && a.month == month)
            .map(|a| a.available_dates)
            .unwrap_or_default())
    }

    async fn set_availability(&self, availability: Availability) -> StoreResult<()> {
        info!(
            cleaner_id = %availability.cleaner_id,
            month = %availability.month,
            dates = availability.available_dates.len(),
            "availability recorded"
        );
        json_file::modify(&self.path, |data: &mut RosterFile| {
            data.availability.retain(|a| {
                !(a.cleaner_id == availability.cleaner_id && a.month == availability.month)
            });
            data.availability.push(availability);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn resubmission_replaces_previous_dates() {
        let roster = InMemoryRoster::new(vec![Cleaner::new("c1", "Alice")]);
        let aug: Month = "2025-08".parse().unwrap();
        roster
            .set_availability(Availability::new("c1", aug, [d("2025-08-01"), d("2025-08-02")]).unwrap())
            .await
            .unwrap();
        roster
            .set_availability(Availability::new("c1", aug, [d("2025-08-05")]).unwrap())
            .await
            .unwrap();

        let dates = roster.available_dates("c1", aug).await.unwrap();
        assert_eq!(dates, BTreeSet::from([d("2025-08-05")]));
        assert!(roster.available_dates("c1", aug.next()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_roster_persists_availability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"{"cleaners":[{"id":"c1","name":"Alice"},{"id":"c2","name":"Bob","isActive":false}]}"#,
        )
        .unwrap();

        let aug: Month = "2025-08".parse().unwrap();
        {
            let roster = JsonFileRoster::open(&path).await.unwrap();
            let cleaners = roster.list_cleaners().await.unwrap();
            assert_eq!(cleaners.len(), 2);
            assert!(!cleaners[1].is_active);
            roster
                .set_availability(Availability::new("c1", aug, [d("2025-08-09")]).unwrap())
                .await
                .unwrap();
        }

        let roster = JsonFileRoster::open(&path).await.unwrap();
        let all = month_availability(&roster, &roster.list_cleaners().await.unwrap(), aug)
            .await
            .unwrap();
        assert_eq!(all[0].available_dates, BTreeSet::from([d("2025-08-09")]));
        assert!(all[1].available_dates.is_empty());
        assert_eq!(
            roster.get_cleaner("c2").await.unwrap().map(|c| c.name),
            Some("Bob".to_string())
        );
    }

    #[tokio::test]
    async fn upsert_keeps_roster_position_and_deactivate_is_soft() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        let roster = JsonFileRoster::open(&path).await.unwrap();

        roster.upsert_cleaner(Cleaner::new("c1", "Alice")).await.unwrap();
        roster.upsert_cleaner(Cleaner::new("c2", "Bob")).await.unwrap();
        roster
            .upsert_cleaner(Cleaner::new("c1", "Alice K").with_line_user("U1"))
            .await
            .unwrap();
        roster.deactivate_cleaner("c2").await.unwrap();

        let reopened = JsonFileRoster::open(&path).await.unwrap();
        let all = reopened.list_cleaners().await.unwrap();
        let ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(all[0].name, "Alice K");
        assert_eq!(all[0].line_user_id.as_deref(), Some("U1"));
        assert!(!all[1].is_active);

        assert!(matches!(
            reopened.deactivate_cleaner("ghost").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn availability_and_cleaner_edits_from_two_handles_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        let aug: Month = "2025-08".parse().unwrap();

        let admin = JsonFileRoster::open(&path).await.unwrap();
        let links = JsonFileRoster::open(&path).await.unwrap();
        admin.upsert_cleaner(Cleaner::new("c1", "Alice")).await.unwrap();
        links
            .set_availability(Availability::new("c1", aug, [d("2025-08-03")]).unwrap())
            .await
            .unwrap();
        admin.upsert_cleaner(Cleaner::new("c2", "Bob")).await.unwrap();

        assert_eq!(links.list_cleaners().await.unwrap().len(), 2);
        assert_eq!(
            admin.available_dates("c1", aug).await.unwrap(),
            BTreeSet::from([d("2025-08-03")])
        );
    }
}
