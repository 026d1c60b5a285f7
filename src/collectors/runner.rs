use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::collectors::JobCollector;
use crate::error::AppError;
use crate::models::posting::{Posting, Source};
use crate::notifier::Notifier;
use crate::pacing::{Clock, Pacer};
use crate::store::StateStore;

/// Minimum gap between two notification dispatches.
pub const NOTIFICATION_SPACING: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub checked_at: DateTime<Utc>,
    /// Postings extracted across all sources, seen or not.
    pub found: usize,
    /// Postings notified and persisted by this run.
    pub new: usize,
    pub failed_sources: Vec<Source>,
    /// True when the run was a no-op because no keywords are configured.
    pub skipped: bool,
}

/// One discovery pass: scrape every enabled source, drop what was already
/// notified, notify the rest with pacing, then persist.
pub struct DiscoveryRunner {
    collectors: Vec<Arc<dyn JobCollector>>,
    state: Arc<StateStore>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
}

impl DiscoveryRunner {
    pub fn new(
        collectors: Vec<Arc<dyn JobCollector>>,
        state: Arc<StateStore>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            collectors,
            state,
            notifier,
            clock,
        }
    }

    pub async fn run_check(&self, cancel: &AtomicBool) -> Result<RunReport, AppError> {
        let run_id = Uuid::new_v4();
        let settings = self.state.settings().await?;

        if settings.keywords.is_empty() {
            tracing::warn!(%run_id, "No keywords configured, skipping check");
            return Ok(RunReport {
                run_id,
                checked_at: self.clock.now(),
                found: 0,
                new: 0,
                failed_sources: Vec::new(),
                skipped: true,
            });
        }

        let seen: HashSet<String> = self.state.seen_ids().await?.into_iter().collect();
        tracing::info!(
            %run_id,
            keywords = ?settings.keywords,
            sites = ?settings.enabled_sites,
            "Starting job search"
        );

        let mut candidates = Vec::new();
        let mut failed_sources = Vec::new();
        for source in Source::ALL {
            if !settings.enabled_sites.contains(&source) {
                continue;
            }
            if cancel.load(Ordering::Relaxed) {
                return Err(AppError::Cancelled);
            }
            match self.collect_from(source, &settings.keywords).await {
                Ok(postings) => {
                    tracing::info!(%run_id, %source, "Found {} jobs", postings.len());
                    candidates.extend(postings);
                }
                Err(e) => {
                    tracing::error!(%run_id, %source, "Error scraping: {e}");
                    failed_sources.push(source);
                }
            }
        }

        if cancel.load(Ordering::Relaxed) {
            return Err(AppError::Cancelled);
        }

        let found = candidates.len();
        let fresh = unseen(candidates, &seen);
        tracing::info!(%run_id, "{} new jobs found", fresh.len());

        let mut pacer = Pacer::new(self.clock.clone(), NOTIFICATION_SPACING);
        for posting in &fresh {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!(%run_id, "Check cancelled during notification dispatch");
                return Err(AppError::Cancelled);
            }
            pacer.wait_turn().await;
            if let Err(e) = self.notifier.notify(posting).await {
                tracing::warn!(%run_id, id = %posting.id, "Notification failed: {e}");
            }
        }

        // Not atomic with the dispatch above: a crash in between means the
        // same postings are notified again on the next run.
        let checked_at = self.clock.now();
        let new = self.state.commit_check(&fresh, checked_at).await?;
        if new > 0 {
            tracing::info!(%run_id, "Saved {new} new jobs");
        } else {
            tracing::info!(%run_id, "No new jobs this time");
        }

        Ok(RunReport {
            run_id,
            checked_at,
            found,
            new,
            failed_sources,
            skipped: false,
        })
    }

    async fn collect_from(&self, source: Source, keywords: &[String]) -> Result<Vec<Posting>, AppError> {
        let collector = self
            .collectors
            .iter()
            .find(|collector| collector.source() == source)
            .ok_or_else(|| AppError::Internal(format!("No collector registered for {source}")))?;
        collector.collect(keywords).await
    }
}

/// Candidates not in `seen`, first occurrence only, order preserved.
fn unseen(candidates: Vec<Posting>, seen: &HashSet<String>) -> Vec<Posting> {
    let mut batch = HashSet::new();
    candidates
        .into_iter()
        .filter(|posting| !seen.contains(&posting.id) && batch.insert(posting.id.clone()))
        .collect()
}
