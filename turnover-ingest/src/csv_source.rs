//! Offline booking export as a reservation source.
//!
//! Expected header (order free, extra columns ignored):
//! id,guest_name,check_in,check_out,status,cleaning_required
//!
//! The file is re-read on every page request and sliced by offset/limit, so
//! the shared pagination loop works unchanged. Query filters are not applied;
//! an export is already the listing the operator wants.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::source::{ReservationQuery, ReservationSource};
use crate::types::{RawId, RawReservation, SnakeReservation};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    guest_name: Option<String>,
    #[serde(default)]
    check_in: Option<String>,
    #[serde(default)]
    check_out: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cleaning_required: Option<String>,
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_flag(v: Option<String>) -> Option<bool> {
    match blank_to_none(v)?.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

impl From<CsvRow> for SnakeReservation {
    fn from(row: CsvRow) -> Self {
        SnakeReservation {
            id: blank_to_none(row.id).map(RawId::Text),
            check_in: blank_to_none(row.check_in),
            check_out: blank_to_none(row.check_out),
            guest_name: blank_to_none(row.guest_name),
            cleaning_required: parse_flag(row.cleaning_required),
            status: blank_to_none(row.status),
            ..Default::default()
        }
    }
}

/// Parse a booking export into raw reservations.
pub fn read_reservations_csv(path: impl AsRef<Path>) -> Result<Vec<RawReservation>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;

    let mut out = Vec::new();
    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("row {}", line + 2))?;
        out.push(RawReservation::Snake(row.into()));
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct CsvReservationSource {
    path: PathBuf,
}

impl CsvReservationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReservationSource for CsvReservationSource {
    async fn fetch_page(
        &self,
        _query: &ReservationQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawReservation>> {
        let all = read_reservations_csv(&self.path)?;
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::source::{PageLimits, fetch_all};
    use std::io::Write;

    fn export(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_rows_with_blanks_and_flags() {
        let f = export(
            "id,guest_name,check_in,check_out,status,cleaning_required\n\
             b1,Sato,2025-08-07,2025-08-10,confirmed,\n\
             b2,,2025-08-10,2025-08-12,cancelled,no\n",
        );
        let raws = read_reservations_csv(f.path()).unwrap();
        assert_eq!(raws.len(), 2);

        let n = Normalizer::new().unwrap();
        let snap = n.normalize_all(&raws);
        assert_eq!(snap.bookings.len(), 2);
        assert!(snap.bookings[0].cleaning_required);
        assert!(!snap.bookings[1].cleaning_required);
        assert!(snap.bookings[1].is_cancelled());
        assert_eq!(snap.bookings[1].guest_name, crate::normalize::UNKNOWN_GUEST);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_reservations_csv("/nonexistent/bookings.csv").is_err());
    }

    #[tokio::test]
    async fn paginates_through_the_shared_loop() {
        let mut body = String::from("id,check_in,check_out\n");
        for i in 0..7 {
            body.push_str(&format!("b{i},2025-08-0{},2025-08-0{}\n", i + 1, i + 2));
        }
        let f = export(&body);
        let src = CsvReservationSource::new(f.path());
        let limits = PageLimits {
            page_size: 3,
            max_pages: 10,
        };
        let raws = fetch_all(&src, &ReservationQuery::default(), limits).await.unwrap();
        assert_eq!(raws.len(), 7);
    }
}
