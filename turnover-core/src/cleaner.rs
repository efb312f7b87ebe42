//! Cleaners and their declared monthly availability.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::calendar::{Month, parse_iso_date};
use crate::error::ScheduleError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cleaner {
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Push-message recipient; cleaners without one are not notified.
    #[serde(default)]
    pub line_user_id: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Cleaner {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
            line_user_id: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_line_user(mut self, user_id: impl Into<String>) -> Self {
        self.line_user_id = Some(user_id.into());
        self
    }
}

/// Dates a cleaner declared for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub cleaner_id: String,
    pub month: Month,
    pub available_dates: BTreeSet<NaiveDate>,
}

impl Availability {
    pub fn new(
        cleaner_id: impl Into<String>,
        month: Month,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Result<Self, ScheduleError> {
        let available_dates: BTreeSet<NaiveDate> = dates.into_iter().collect();
        if let Some(stray) = available_dates.iter().find(|d| !month.contains(**d)) {
            return Err(ScheduleError::validation(format!(
                "date {stray} is outside {month}"
            )));
        }
        Ok(Self {
            cleaner_id: cleaner_id.into(),
            month,
            available_dates,
        })
    }

    pub fn is_available(&self, date: NaiveDate) -> bool {
        self.available_dates.contains(&date)
    }
}

/// Parse user-submitted availability strings, all of which must be
/// `YYYY-MM-DD` dates inside `month`.
pub fn parse_available_dates<S: AsRef<str>>(
    month: Month,
    raw: &[S],
) -> Result<BTreeSet<NaiveDate>, ScheduleError> {
    let date_re = Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .map_err(|e| ScheduleError::validation(e.to_string()))?;

    let mut out = BTreeSet::new();
    for s in raw {
        let s = s.as_ref().trim();
        if !date_re.is_match(s) {
            return Err(ScheduleError::validation(format!(
                "invalid date format '{s}', use YYYY-MM-DD"
            )));
        }
        let date = parse_iso_date(s)?;
        if !month.contains(date) {
            return Err(ScheduleError::validation(format!("date {date} is outside {month}")));
        }
        out.insert(date);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_dedupes_dates_within_month() {
        let month: Month = "2025-08".parse().unwrap();
        let dates = parse_available_dates(month, &["2025-08-03", "2025-08-01", "2025-08-03"]).unwrap();
        assert_eq!(dates.len(), 2);
        assert_eq!(dates.iter().next().unwrap().to_string(), "2025-08-01");
    }

    #[test]
    fn rejects_bad_format_and_other_months() {
        let month: Month = "2025-08".parse().unwrap();
        assert!(parse_available_dates(month, &["2025/08/03"]).is_err());
        assert!(parse_available_dates(month, &["2025-8-3"]).is_err());
        assert!(parse_available_dates(month, &["2025-09-01"]).is_err());
    }
}
