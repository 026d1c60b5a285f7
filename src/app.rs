use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::hash_token;
use crate::collectors::runner::RunReport;
use crate::error::AppError;
use crate::models::posting::{Posting, Source};
use crate::models::settings::{Settings, UpdateSettings};
use crate::notifier::{Notifier, sample_posting};
use crate::pacing::Clock;
use crate::scheduler::Scheduler;
use crate::store::StateStore;

/// Everything the command surface can reach.
pub struct App {
    pub state: Arc<StateStore>,
    pub scheduler: Arc<Scheduler>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    api_token_hash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostingFilters {
    pub source: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_new_count: Option<u32>,
    pub checks_recorded: usize,
    pub seen_count: usize,
    pub saved_count: usize,
    pub running: bool,
    pub check_interval: u32,
}

impl App {
    pub fn new(
        state: Arc<StateStore>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        api_token: Option<&str>,
    ) -> Self {
        Self {
            state,
            scheduler,
            notifier,
            clock,
            api_token_hash: api_token.filter(|t| !t.is_empty()).map(hash_token),
        }
    }

    /// None when the API is open.
    pub fn api_token_hash(&self) -> Option<&str> {
        self.api_token_hash.as_deref()
    }

    pub async fn check_now(&self) -> Result<RunReport, AppError> {
        self.scheduler.check_now().await
    }

    pub async fn settings(&self) -> Result<Settings, AppError> {
        self.state.settings().await
    }

    pub async fn update_settings(&self, patch: &UpdateSettings) -> Result<Settings, AppError> {
        let scheduler = &self.scheduler;
        let settings = self
            .state
            .update_settings(patch, |next| scheduler.reschedule(next.interval()))
            .await?;
        tracing::info!(?settings, "Settings updated");
        Ok(settings)
    }

    /// Show a synthetic posting through the normal alert path. Nothing is
    /// persisted.
    pub async fn test_notification(&self) -> Result<Posting, AppError> {
        let posting = sample_posting(self.clock.now());
        self.notifier.notify(&posting).await?;
        Ok(posting)
    }

    /// Saved postings, newest first.
    pub async fn postings(&self, filters: &PostingFilters) -> Result<Vec<Posting>, AppError> {
        let source: Option<Source> = filters.source.as_deref().map(str::parse).transpose()?;
        let postings = self
            .state
            .saved_postings()
            .await?
            .into_iter()
            .rev()
            .filter(|p| source.is_none_or(|s| p.source == s))
            .take(filters.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(postings)
    }

    pub async fn status(&self) -> Result<Status, AppError> {
        let log = self.state.check_log().await?;
        let latest = log.latest();
        let settings = self.state.settings().await?;

        Ok(Status {
            last_checked_at: latest.map(|(at, _)| at),
            last_new_count: latest.map(|(_, count)| count),
            checks_recorded: log.len(),
            seen_count: self.state.seen_ids().await?.len(),
            saved_count: self.state.saved_postings().await?.len(),
            running: self.scheduler.is_running(),
            check_interval: settings.check_interval,
        })
    }
}
