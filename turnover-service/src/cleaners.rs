//! Roster administration: add, edit and deactivate cleaners.

use std::sync::Arc;

use chrono::NaiveDate;
use turnover_core::{Cleaner, ScheduleError};

use crate::roster::CleanerDirectory;
use crate::store::{TaskQuery, TaskStore};

/// Field-level edit; `None` leaves a field alone, `line_user_id:
/// Some(None)` clears the push recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanerUpdate {
    pub name: Option<String>,
    pub line_user_id: Option<Option<String>>,
    pub active: Option<bool>,
}

fn non_blank(field: &str, value: &str) -> Result<String, ScheduleError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ScheduleError::validation(format!("cleaner {field} is required")));
    }
    Ok(v.to_string())
}

pub struct CleanerAdmin {
    directory: Arc<dyn CleanerDirectory>,
    store: Arc<dyn TaskStore>,
}

impl CleanerAdmin {
    pub fn new(directory: Arc<dyn CleanerDirectory>, store: Arc<dyn TaskStore>) -> Self {
        Self { directory, store }
    }

    /// Roster order. Inactive cleaners only when asked for.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Cleaner>, ScheduleError> {
        let mut all = self.directory.list_cleaners().await?;
        if !include_inactive {
            all.retain(|c| c.is_active);
        }
        Ok(all)
    }

    pub async fn add(
        &self,
        id: &str,
        name: &str,
        line_user_id: Option<&str>,
    ) -> Result<Cleaner, ScheduleError> {
        let id = non_blank("id", id)?;
        let name = non_blank("name", name)?;
        if self.directory.get_cleaner(&id).await?.is_some() {
            return Err(ScheduleError::validation(format!("cleaner {id} already exists")));
        }
        let mut cleaner = Cleaner::new(id, name);
        cleaner.line_user_id = line_user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        Ok(self.directory.upsert_cleaner(cleaner).await?)
    }

    pub async fn update(&self, id: &str, edit: &CleanerUpdate) -> Result<Cleaner, ScheduleError> {
        let mut cleaner = self
            .directory
            .get_cleaner(id)
            .await?
            .ok_or_else(|| ScheduleError::cleaner_not_found(id))?;
        if let Some(name) = &edit.name {
            cleaner.name = non_blank("name", name)?;
        }
        if let Some(user) = &edit.line_user_id {
            cleaner.line_user_id = user
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string);
        }
        if let Some(active) = edit.active {
            cleaner.is_active = active;
        }
        Ok(self.directory.upsert_cleaner(cleaner).await?)
    }

    /// Soft delete. Refused while the cleaner still holds cleanings on or
    /// after `today`; past assignments keep pointing at the record.
    pub async fn deactivate(&self, id: &str, today: NaiveDate) -> Result<Cleaner, ScheduleError> {
        if self.directory.get_cleaner(id).await?.is_none() {
            return Err(ScheduleError::cleaner_not_found(id));
        }
        let upcoming: Vec<String> = self
            .store
            .query(&TaskQuery::CleanerId(id.to_string()))
            .await?
            .into_iter()
            .filter(|t| t.current_cleaning_date >= today)
            .map(|t| t.id)
            .collect();
        if !upcoming.is_empty() {
            return Err(ScheduleError::validation(format!(
                "cleaner {id} still has {} upcoming cleaning(s): {}",
                upcoming.len(),
                upcoming.join(", ")
            )));
        }
        Ok(self.directory.deactivate_cleaner(id).await?)
    }
}
