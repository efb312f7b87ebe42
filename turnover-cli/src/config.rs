use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use turnover_core::{DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};
use turnover_ingest::hostex::DEFAULT_BASE_URL as HOSTEX_BASE_URL;
use turnover_service::links::{DEFAULT_LINK_TTL_DAYS, MAX_LINK_TTL_DAYS};
use turnover_service::notify::DEFAULT_LINE_API_BASE;

/// Secrets never live here; sections only name the environment variable
/// that holds them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bookings: BookingsSection,
    pub store: StoreSection,
    pub schedule: ScheduleSection,
    pub links: LinksSection,
    pub line: LineSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingsSection {
    /// "hostex" or "csv"
    pub source: String,
    pub base_url: String,
    pub token_env: String,
    /// Export used when source = "csv"
    pub csv_path: Option<String>,
    /// Aggregator status filter, e.g. "accepted"
    pub status: Option<String>,
    pub page_size: usize,
    pub max_pages: usize,
    pub min_refetch_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub tasks_file: String,
    pub roster_file: String,
    pub max_batch: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// How far a task may float when no later booking bounds it.
    pub horizon_days: u32,
    /// Property timezone; decides what "this month" means.
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksSection {
    pub secret_env: String,
    pub ttl_days: i64,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSection {
    pub enabled: bool,
    pub token_env: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// "pretty", "json" or "compact"
    pub format: String,
}

impl Default for BookingsSection {
    fn default() -> Self {
        Self {
            source: "hostex".to_string(),
            base_url: HOSTEX_BASE_URL.to_string(),
            token_env: "HOSTEX_ACCESS_TOKEN".to_string(),
            csv_path: None,
            status: None,
            page_size: 100,
            max_pages: 10,
            min_refetch_secs: 5,
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            tasks_file: "tasks.json".to_string(),
            roster_file: "roster.json".to_string(),
            max_batch: 500,
        }
    }
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            timezone: "Asia/Tokyo".to_string(),
        }
    }
}

impl Default for LinksSection {
    fn default() -> Self {
        Self {
            secret_env: "TURNOVER_LINK_SECRET".to_string(),
            ttl_days: DEFAULT_LINK_TTL_DAYS,
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for LineSection {
    fn default() -> Self {
        Self {
            enabled: false,
            token_env: "LINE_CHANNEL_ACCESS_TOKEN".to_string(),
            api_base: DEFAULT_LINE_API_BASE.to_string(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        match self.bookings.source.as_str() {
            "hostex" => {}
            "csv" if self.bookings.csv_path.is_some() => {}
            "csv" => bail!("bookings.source = \"csv\" needs bookings.csv_path"),
            other => bail!("unknown bookings.source: {other}"),
        }
        if self.bookings.page_size == 0 {
            bail!("bookings.page_size must be at least 1");
        }
        if self.store.max_batch == 0 {
            bail!("store.max_batch must be at least 1");
        }
        if self.schedule.horizon_days > MAX_HORIZON_DAYS {
            bail!("schedule.horizon_days must be at most {MAX_HORIZON_DAYS}");
        }
        if !(1..=MAX_LINK_TTL_DAYS).contains(&self.links.ttl_days) {
            bail!("links.ttl_days must be between 1 and {MAX_LINK_TTL_DAYS}");
        }
        self.schedule
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("schedule.timezone: {e}"))?;
        Ok(())
    }
}

/// Read a secret from the environment variable a config section names.
pub fn secret_from_env(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("environment variable {var} is not set"))
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

pub fn load_config(home: &Path) -> Result<Config> {
    let p = config_path(home);
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).context("parse config.toml")?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config(home: &Path, cfg: &Config) -> Result<()> {
    let p = config_path(home);
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config(home: &Path) -> Result<()> {
    let p = config_path(home);
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(home, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
