//! Hostex reservations API client.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::source::{ReservationQuery, ReservationSource};
use crate::types::RawReservation;

pub const DEFAULT_BASE_URL: &str = "https://api.hostex.io/v3";

#[derive(Debug, Clone)]
pub struct HostexClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Data>,
}

#[derive(Deserialize)]
struct Data {
    #[serde(default)]
    reservations: Vec<RawReservation>,
}

impl HostexClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token)).context("invalid Hostex token")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// Query-string pairs for one page request.
pub fn page_params(query: &ReservationQuery, offset: usize, limit: usize) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
    if let Some(status) = &query.status {
        params.push(("status", status.clone()));
    }
    if let Some(range) = &query.check_in {
        params.push(("start_check_in_date", range.start.format("%Y-%m-%d").to_string()));
        params.push(("end_check_in_date", range.end.format("%Y-%m-%d").to_string()));
    }
    params
}

#[async_trait]
impl ReservationSource for HostexClient {
    async fn fetch_page(
        &self,
        query: &ReservationQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawReservation>> {
        let resp = self
            .http
            .get(format!("{}/reservations", self.base_url))
            .headers(self.headers()?)
            .query(&page_params(query, offset, limit))
            .send()
            .await
            .context("hostex request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("hostex error: {status} {txt}");
        }

        let body: Envelope = resp.json().await.context("parse hostex response")?;
        Ok(body.data.map(|d| d.reservations).unwrap_or_default())
    }
}
