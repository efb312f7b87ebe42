//! Notifications to cleaners.
//!
//! Fire-and-forget: every send outcome is logged, nothing is retried, and a
//! failed send never fails the operation that triggered it.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use turnover_core::{Cleaner, CleaningTask, Month, ScheduleError};

use crate::store::{TaskQuery, TaskStore};

pub const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("channel rejected message: {status} {body}")]
    Rejected { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError>;
}

/// LINE Messaging API push channel.
pub struct LineNotifier {
    api_base: String,
    token: String,
    http: reqwest::Client,
}

impl LineNotifier {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        let body = json!({
            "to": recipient,
            "messages": [{ "type": "text", "text": text }],
        });
        let resp = self
            .http
            .post(format!("{}/v2/bot/message/push", self.api_base))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Dry-run channel: logs and remembers what would have been sent.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        info!(recipient, chars = text.chars().count(), "dry-run message");
        self.sent
            .lock()
            .await
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }
}

pub fn assignment_message(cleaner: &Cleaner, task: &CleaningTask) -> String {
    format!(
        "New cleaning assignment\n\n{}\nDate: {}\nGuest: {}\nCheckout: {}",
        cleaner.name,
        task.current_cleaning_date.format("%Y-%m-%d (%a)"),
        task.guest_name,
        task.original_checkout_date.format("%Y-%m-%d"),
    )
}

/// One line per task, sorted by cleaning date.
pub fn monthly_schedule_message(cleaner: &Cleaner, month: Month, tasks: &[CleaningTask]) -> String {
    let mut mine: Vec<&CleaningTask> = tasks
        .iter()
        .filter(|t| t.cleaner_id.as_deref() == Some(cleaner.id.as_str()))
        .collect();
    mine.sort_by_key(|t| (t.current_cleaning_date, t.id.clone()));

    let mut text = format!("Cleaning schedule for {month}\n\n{}\n\n", cleaner.name);
    if mine.is_empty() {
        text.push_str("No cleanings this month.\n");
    }
    for t in mine {
        text.push_str(&format!(
            "{}: {}\n",
            t.current_cleaning_date.format("%m/%d (%a)"),
            t.guest_name
        ));
    }
    text
}

/// Tell one cleaner about one new assignment. Returns whether it was
/// delivered.
pub async fn send_assignment_notice(
    notifier: &dyn Notifier,
    cleaner: &Cleaner,
    task: &CleaningTask,
) -> bool {
    let Some(user) = cleaner.line_user_id.as_deref() else {
        info!(cleaner_id = %cleaner.id, task_id = %task.id, "no LINE user id, not notified");
        return false;
    };
    match notifier.send(user, &assignment_message(cleaner, task)).await {
        Ok(()) => {
            info!(cleaner_id = %cleaner.id, task_id = %task.id, "assignment notice sent");
            true
        }
        Err(e) => {
            warn!(cleaner_id = %cleaner.id, task_id = %task.id, error = %e, "assignment notice failed");
            false
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyReport {
    pub sent: Vec<String>,
    /// Cleaners with no push recipient on file.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Send each listed cleaner their schedule for `month`.
pub async fn send_monthly_schedules(
    notifier: &dyn Notifier,
    store: &dyn TaskStore,
    cleaners: &[Cleaner],
    month: Month,
    recipients: &BTreeSet<String>,
) -> Result<NotifyReport, ScheduleError> {
    let tasks = store.query(&TaskQuery::CleaningDateBetween(month.range())).await?;
    let mut report = NotifyReport::default();

    for cleaner in cleaners.iter().filter(|c| recipients.contains(&c.id)) {
        let Some(user) = cleaner.line_user_id.as_deref() else {
            info!(cleaner_id = %cleaner.id, "no LINE user id, not notified");
            report.skipped.push(cleaner.id.clone());
            continue;
        };
        let text = monthly_schedule_message(cleaner, month, &tasks);
        match notifier.send(user, &text).await {
            Ok(()) => {
                info!(cleaner_id = %cleaner.id, %month, "schedule sent");
                report.sent.push(cleaner.id.clone());
            }
            Err(e) => {
                warn!(cleaner_id = %cleaner.id, error = %e, "schedule send failed");
                report.failed.push(cleaner.id.clone());
            }
        }
    }
    Ok(report)
}
