//! Availability links: issue a signed per-month link for a cleaner, and
//! record the dates submitted through it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use turnover_core::{
    Availability, LinkClaims, LinkSigner, Month, ScheduleError, TokenError, parse_available_dates,
};

use crate::roster::{AvailabilitySource, CleanerDirectory};

pub const DEFAULT_LINK_TTL_DAYS: i64 = 45;
pub const MAX_LINK_TTL_DAYS: i64 = 366;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl From<crate::error::StoreError> for LinkError {
    fn from(e: crate::error::StoreError) -> Self {
        LinkError::Schedule(e.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedLink {
    pub token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AvailabilityLinks {
    signer: LinkSigner,
    ttl: Duration,
    base_url: String,
    cleaners: Arc<dyn CleanerDirectory>,
    availability: Arc<dyn AvailabilitySource>,
}

impl AvailabilityLinks {
    pub fn new(
        signer: LinkSigner,
        base_url: impl Into<String>,
        cleaners: Arc<dyn CleanerDirectory>,
        availability: Arc<dyn AvailabilitySource>,
    ) -> Self {
        Self {
            signer,
            ttl: Duration::days(DEFAULT_LINK_TTL_DAYS),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cleaners,
            availability,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn url_for(&self, token: &str) -> String {
        format!("{}/#/availability/{token}", self.base_url)
    }

    pub async fn issue(
        &self,
        cleaner_id: &str,
        month: Month,
        now: DateTime<Utc>,
    ) -> Result<IssuedLink, LinkError> {
        let cleaner = self
            .cleaners
            .get_cleaner(cleaner_id)
            .await?
            .ok_or_else(|| ScheduleError::cleaner_not_found(cleaner_id))?;

        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| ScheduleError::validation("link expiry is out of range"))?;
        let claims = LinkClaims {
            cleaner_id: cleaner.id,
            month,
            expires_at,
        };
        let token = self.signer.issue(&claims)?;
        info!(cleaner_id, %month, expires_at = %claims.expires_at, "availability link issued");
        Ok(IssuedLink {
            url: self.url_for(&token),
            token,
            expires_at: claims.expires_at,
        })
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<LinkClaims, LinkError> {
        Ok(self.signer.verify(token, now)?)
    }

    /// Record the dates a cleaner submitted through their link. The token
    /// decides who and which month; the dates must all fall in that month.
    pub async fn submit<S: AsRef<str>>(
        &self,
        token: &str,
        dates: &[S],
        now: DateTime<Utc>,
    ) -> Result<Availability, LinkError> {
        let claims = self.verify(token, now)?;
        let cleaner = self
            .cleaners
            .get_cleaner(&claims.cleaner_id)
            .await?
            .ok_or_else(|| ScheduleError::cleaner_not_found(&claims.cleaner_id))?;
        if !cleaner.is_active {
            return Err(ScheduleError::validation(format!("cleaner {} is inactive", cleaner.id)).into());
        }

        let dates = parse_available_dates(claims.month, dates)?;
        let availability = Availability::new(cleaner.id, claims.month, dates)?;
        self.availability.set_availability(availability.clone()).await?;
        Ok(availability)
    }
}
