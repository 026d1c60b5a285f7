use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::check_log::CheckLog;
use crate::models::posting::{Posting, Source};
use crate::models::settings::{Settings, UpdateSettings};
use crate::store::{KeyValueStore, keys};

/// Caps on the collections that otherwise grow with every check.
/// Zero disables a cap.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub max_seen_ids: usize,
    pub max_saved_postings: usize,
    pub max_check_records: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            max_seen_ids: 5000,
            max_saved_postings: 500,
            max_check_records: 100,
        }
    }
}

/// Typed view of the persisted record. Every read-modify-write goes through
/// the writer lock so a settings update and a check commit never lose each
/// other's changes.
pub struct StateStore {
    kv: Arc<dyn KeyValueStore>,
    retention: Retention,
    writer: Mutex<()>,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, retention: Retention) -> Self {
        Self {
            kv,
            retention,
            writer: Mutex::new(()),
        }
    }

    /// Write default settings and empty collections if nothing has been
    /// stored yet. Returns true on first start.
    pub async fn initialize(&self) -> Result<bool, AppError> {
        let _writer = self.writer.lock().await;
        let existing = self.kv.get(&[keys::KEYWORDS]).await?;
        if !existing.is_empty() {
            return Ok(false);
        }

        let defaults = Settings::default();
        let mut record = settings_record(&defaults)?;
        record.insert(keys::LAST_CHECKED.into(), to_value(&CheckLog::default())?);
        record.insert(keys::SAVED_JOBS.into(), Value::Array(Vec::new()));
        record.insert(keys::SEEN_JOB_IDS.into(), Value::Array(Vec::new()));
        self.kv.set(record).await?;

        tracing::info!(
            keywords = ?defaults.keywords,
            interval = defaults.check_interval,
            "Stored default settings"
        );
        Ok(true)
    }

    pub async fn settings(&self) -> Result<Settings, AppError> {
        let record = self
            .kv
            .get(&[keys::KEYWORDS, keys::CHECK_INTERVAL, keys::ENABLED_SITES])
            .await?;
        let defaults = Settings::default();

        let keywords = field(&record, keys::KEYWORDS)?.unwrap_or(defaults.keywords);
        let check_interval = field::<u32>(&record, keys::CHECK_INTERVAL)?
            .unwrap_or(defaults.check_interval)
            .max(1);
        let enabled_sites = match field::<Vec<String>>(&record, keys::ENABLED_SITES)? {
            Some(tags) => tags
                .iter()
                .filter_map(|tag| match tag.parse::<Source>() {
                    Ok(source) => Some(source),
                    Err(_) => {
                        tracing::warn!("Ignoring unknown stored site '{tag}'");
                        None
                    }
                })
                .collect(),
            None => defaults.enabled_sites,
        };

        Ok(Settings {
            keywords,
            check_interval,
            enabled_sites,
        })
    }

    pub async fn seen_ids(&self) -> Result<Vec<String>, AppError> {
        let record = self.kv.get(&[keys::SEEN_JOB_IDS]).await?;
        Ok(field(&record, keys::SEEN_JOB_IDS)?.unwrap_or_default())
    }

    pub async fn saved_postings(&self) -> Result<Vec<Posting>, AppError> {
        let record = self.kv.get(&[keys::SAVED_JOBS]).await?;
        Ok(field(&record, keys::SAVED_JOBS)?.unwrap_or_default())
    }

    pub async fn find_saved(&self, id: &str) -> Result<Option<Posting>, AppError> {
        Ok(self
            .saved_postings()
            .await?
            .into_iter()
            .find(|posting| posting.id == id))
    }

    pub async fn check_log(&self) -> Result<CheckLog, AppError> {
        let record = self.kv.get(&[keys::LAST_CHECKED]).await?;
        Ok(field(&record, keys::LAST_CHECKED)?.unwrap_or_default())
    }

    /// Merge a patch into the stored settings. `on_interval_change` runs
    /// with the new interval while the writer lock is still held, so the
    /// timer and the stored value cannot diverge.
    pub async fn update_settings<F>(
        &self,
        patch: &UpdateSettings,
        on_interval_change: F,
    ) -> Result<Settings, AppError>
    where
        F: FnOnce(&Settings),
    {
        let _writer = self.writer.lock().await;
        let current = self.settings().await?;
        let next = current.merged(patch)?;

        self.kv.set(settings_record(&next)?).await?;

        if next.check_interval != current.check_interval {
            on_interval_change(&next);
        }
        Ok(next)
    }

    /// Persist the outcome of a check: append new postings and their ids,
    /// log the check, apply retention. Ids already present (for instance
    /// committed by a concurrent writer) are not appended twice. Returns the
    /// number of postings actually appended.
    pub async fn commit_check(
        &self,
        new_postings: &[Posting],
        checked_at: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let _writer = self.writer.lock().await;
        let record = self
            .kv
            .get(&[keys::SEEN_JOB_IDS, keys::SAVED_JOBS, keys::LAST_CHECKED])
            .await?;

        let mut seen: Vec<String> = field(&record, keys::SEEN_JOB_IDS)?.unwrap_or_default();
        let mut saved: Vec<Posting> = field(&record, keys::SAVED_JOBS)?.unwrap_or_default();
        let mut log: CheckLog = field(&record, keys::LAST_CHECKED)?.unwrap_or_default();

        let mut known: HashSet<String> = seen.iter().cloned().collect();
        let mut appended = 0;
        for posting in new_postings {
            if !known.insert(posting.id.clone()) {
                continue;
            }
            seen.push(posting.id.clone());
            saved.push(posting.clone());
            appended += 1;
        }

        log.record(checked_at, u32::try_from(appended).unwrap_or(u32::MAX));

        keep_newest(&mut seen, self.retention.max_seen_ids);
        keep_newest(&mut saved, self.retention.max_saved_postings);
        log.trim(self.retention.max_check_records);

        let mut update = Map::new();
        update.insert(keys::SEEN_JOB_IDS.into(), to_value(&seen)?);
        update.insert(keys::SAVED_JOBS.into(), to_value(&saved)?);
        update.insert(keys::LAST_CHECKED.into(), to_value(&log)?);
        self.kv.set(update).await?;

        Ok(appended)
    }
}

fn settings_record(settings: &Settings) -> Result<Map<String, Value>, AppError> {
    let mut record = Map::new();
    record.insert(keys::KEYWORDS.into(), to_value(&settings.keywords)?);
    record.insert(keys::CHECK_INTERVAL.into(), to_value(settings.check_interval)?);
    record.insert(keys::ENABLED_SITES.into(), to_value(&settings.enabled_sites)?);
    Ok(record)
}

fn field<T: DeserializeOwned>(record: &Map<String, Value>, key: &str) -> Result<Option<T>, AppError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, AppError> {
    Ok(serde_json::to_value(value)?)
}

fn keep_newest<T>(items: &mut Vec<T>, max: usize) {
    if max > 0 && items.len() > max {
        items.drain(..items.len() - max);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::{MemoryStore, posting};

    fn state_with(kv: Arc<MemoryStore>, retention: Retention) -> StateStore {
        StateStore::new(kv, retention)
    }

    #[tokio::test]
    async fn initialize_writes_defaults_once() {
        let kv = Arc::new(MemoryStore::default());
        let state = state_with(kv.clone(), Retention::default());

        assert!(state.initialize().await.unwrap());
        assert_eq!(state.settings().await.unwrap(), Settings::default());
        assert!(state.seen_ids().await.unwrap().is_empty());

        state
            .update_settings(
                &UpdateSettings {
                    keywords: Some(vec!["rust".into()]),
                    ..Default::default()
                },
                |_| {},
            )
            .await
            .unwrap();
        assert!(!state.initialize().await.unwrap());
        assert_eq!(state.settings().await.unwrap().keywords, vec!["rust"]);
    }

    #[tokio::test]
    async fn settings_ignore_unknown_stored_sites() {
        let kv = Arc::new(MemoryStore::default());
        kv.insert(keys::ENABLED_SITES, json!(["indeed", "monster"]));
        let state = state_with(kv, Retention::default());
        assert_eq!(
            state.settings().await.unwrap().enabled_sites,
            vec![Source::Indeed]
        );
    }

    #[tokio::test]
    async fn interval_callback_only_fires_on_change() {
        let state = state_with(Arc::new(MemoryStore::default()), Retention::default());
        state.initialize().await.unwrap();

        let mut fired = None;
        state
            .update_settings(
                &UpdateSettings {
                    keywords: Some(vec!["go".into()]),
                    check_interval: Some(30),
                    ..Default::default()
                },
                |s| fired = Some(s.check_interval),
            )
            .await
            .unwrap();
        assert_eq!(fired, None);

        state
            .update_settings(
                &UpdateSettings {
                    check_interval: Some(10),
                    ..Default::default()
                },
                |s| fired = Some(s.check_interval),
            )
            .await
            .unwrap();
        assert_eq!(fired, Some(10));
    }

    #[tokio::test]
    async fn invalid_patch_leaves_store_untouched() {
        let kv = Arc::new(MemoryStore::default());
        let state = state_with(kv.clone(), Retention::default());
        state.initialize().await.unwrap();
        let writes = kv.write_count();

        let result = state
            .update_settings(
                &UpdateSettings {
                    check_interval: Some(0),
                    ..Default::default()
                },
                |_| panic!("must not reschedule"),
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(kv.write_count(), writes);
    }

    #[tokio::test]
    async fn commit_appends_without_duplicates() {
        let state = state_with(Arc::new(MemoryStore::default()), Retention::default());
        let now = Utc::now();
        let a = posting(Source::Indeed, 1);
        let b = posting(Source::Indeed, 2);

        assert_eq!(state.commit_check(&[a.clone(), b.clone()], now).await.unwrap(), 2);
        assert_eq!(
            state
                .commit_check(&[b.clone()], now + chrono::Duration::minutes(30))
                .await
                .unwrap(),
            0
        );

        assert_eq!(state.seen_ids().await.unwrap(), vec![a.id.clone(), b.id.clone()]);
        assert_eq!(state.saved_postings().await.unwrap(), vec![a.clone(), b]);
        assert_eq!(state.find_saved(&a.id).await.unwrap(), Some(a));

        let log = state.check_log().await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.latest().map(|(_, count)| count), Some(0));
    }

    #[tokio::test]
    async fn commit_applies_retention() {
        let retention = Retention {
            max_seen_ids: 3,
            max_saved_postings: 2,
            max_check_records: 1,
        };
        let state = state_with(Arc::new(MemoryStore::default()), retention);
        let postings: Vec<_> = (1..=4).map(|n| posting(Source::LinkedIn, n)).collect();

        state.commit_check(&postings[..2], Utc::now()).await.unwrap();
        state
            .commit_check(&postings[2..], Utc::now() + chrono::Duration::minutes(1))
            .await
            .unwrap();

        let seen = state.seen_ids().await.unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.first(), Some(&postings[1].id));

        let saved = state.saved_postings().await.unwrap();
        assert_eq!(saved, postings[2..].to_vec());
        assert_eq!(state.check_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_values_surface_as_errors() {
        let kv = Arc::new(MemoryStore::default());
        kv.insert(keys::SEEN_JOB_IDS, json!({ "not": "a list" }));
        let state = state_with(kv, Retention::default());
        assert!(matches!(
            state.seen_ids().await,
            Err(AppError::Serialization(_))
        ));
    }
}
