//! Wiring from config to the concrete feed, stores and channels.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};
use turnover_core::{Booking, LinkSigner, Month, RelocationPolicy};
use turnover_ingest::{
    BookingFeed, CsvReservationSource, HostexClient, NormalizedSnapshot, PageLimits,
    ReservationQuery, ReservationSource,
};
use turnover_service::{
    AvailabilityLinks, JsonFileRoster, JsonFileTaskStore, LineNotifier, LogNotifier, Notifier,
};

use crate::config::{Config, load_config, secret_from_env};
use crate::state::{ensure_turnover_home, resolve_in_home};

pub struct App {
    pub home: PathBuf,
    pub cfg: Config,
    pub tz: Tz,
}

impl App {
    pub fn load(home: Option<&Path>) -> Result<Self> {
        let home = ensure_turnover_home(home)?;
        let cfg = load_config(&home)?;
        let tz: Tz = cfg
            .schedule
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("schedule.timezone: {e}"))?;
        Ok(Self { home, cfg, tz })
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Month containing today in the property's timezone.
    pub fn current_month(&self) -> Month {
        Month::of(self.today())
    }

    pub fn month_or_current(&self, month: Option<Month>) -> Month {
        month.unwrap_or_else(|| self.current_month())
    }

    pub fn relocation_policy(&self) -> RelocationPolicy {
        RelocationPolicy {
            horizon_days: self.cfg.schedule.horizon_days,
        }
    }

    pub async fn task_store(&self) -> Result<Arc<JsonFileTaskStore>> {
        let path = resolve_in_home(&self.home, &self.cfg.store.tasks_file);
        let store = JsonFileTaskStore::open(&path)
            .await
            .with_context(|| format!("open task store {}", path.display()))?
            .with_max_batch(self.cfg.store.max_batch);
        Ok(Arc::new(store))
    }

    pub async fn roster(&self) -> Result<Arc<JsonFileRoster>> {
        let path = resolve_in_home(&self.home, &self.cfg.store.roster_file);
        let roster = JsonFileRoster::open(&path)
            .await
            .with_context(|| format!("open roster {}", path.display()))?;
        Ok(Arc::new(roster))
    }

    fn reservation_source(&self) -> Result<Box<dyn ReservationSource>> {
        let b = &self.cfg.bookings;
        Ok(match b.source.as_str() {
            "csv" => {
                let path = b.csv_path.as_deref().context("bookings.csv_path is not set")?;
                Box::new(CsvReservationSource::new(resolve_in_home(&self.home, path)))
            }
            _ => {
                let token = secret_from_env(&b.token_env)?;
                Box::new(HostexClient::new(&b.base_url, token))
            }
        })
    }

    pub async fn booking_snapshot(&self) -> Result<NormalizedSnapshot> {
        let b = &self.cfg.bookings;
        let mut feed = BookingFeed::new(self.reservation_source()?)?
            .with_query(ReservationQuery {
                status: b.status.clone(),
                check_in: None,
            })
            .with_limits(PageLimits {
                page_size: b.page_size,
                max_pages: b.max_pages,
            })
            .with_min_refetch(Duration::seconds(b.min_refetch_secs));

        let snap = feed.snapshot(Utc::now()).await.context("fetch bookings")?;
        if !snap.rejected.is_empty() {
            warn!(rejected = snap.rejected.len(), "some reservations could not be used");
        }
        Ok(snap)
    }

    pub async fn bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.booking_snapshot().await?.bookings)
    }

    /// LINE when enabled and a token is present, otherwise a dry run.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        let line = &self.cfg.line;
        if line.enabled {
            match secret_from_env(&line.token_env) {
                Ok(token) => return Arc::new(LineNotifier::new(&line.api_base, token)),
                Err(e) => warn!(error = %e, "LINE enabled but no token; falling back to dry run"),
            }
        }
        info!("notifications in dry-run mode");
        Arc::new(LogNotifier::new())
    }

    pub async fn links(&self) -> Result<AvailabilityLinks> {
        let secret = secret_from_env(&self.cfg.links.secret_env)?;
        let signer = LinkSigner::new(secret).context("link secret")?;
        let roster = self.roster().await?;
        let ttl = Duration::try_days(self.cfg.links.ttl_days)
            .context("links.ttl_days is out of range")?;
        Ok(
            AvailabilityLinks::new(signer, &self.cfg.links.base_url, roster.clone(), roster)
                .with_ttl(ttl),
        )
    }
}
