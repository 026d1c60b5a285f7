//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tokio::sync::Notify;

use crate::app::App;
use crate::collectors::JobCollector;
use crate::collectors::browser::{BrowsingContext, ContextHandle, Page};
use crate::collectors::runner::DiscoveryRunner;
use crate::error::AppError;
use crate::models::posting::{Posting, Source};
use crate::notifier::{Alert, NotificationService, Notifier, UrlOpener};
use crate::pacing::Clock;
use crate::scheduler::Scheduler;
use crate::store::{KeyValueStore, Retention, StateStore};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

pub fn posting(source: Source, n: u32) -> Posting {
    Posting::new(
        source,
        format!("Engineer {n}"),
        format!("Company {n}"),
        "Remote",
        (n % 2 == 0).then(|| format!("{n}0k EUR")),
        format!("https://jobs.example.com/{source}/{n}"),
        epoch(),
    )
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Seed a value without counting it as a write.
    pub fn insert(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, AppError> {
        let entries = self.entries.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, record: Map<String, Value>) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated write failure".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().extend(record);
        Ok(())
    }
}

/// Virtual time: `sleep` advances the clock instead of waiting.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(epoch()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

enum Behavior {
    Returning(Vec<Posting>),
    Failing,
    Blocking,
}

pub struct FakeCollector {
    source: Source,
    behavior: Behavior,
    calls: AtomicUsize,
    started: Notify,
    gate: Notify,
}

impl FakeCollector {
    fn with(source: Source, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            source,
            behavior,
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            gate: Notify::new(),
        })
    }

    pub fn returning(source: Source, postings: Vec<Posting>) -> Arc<Self> {
        Self::with(source, Behavior::Returning(postings))
    }

    pub fn failing(source: Source) -> Arc<Self> {
        Self::with(source, Behavior::Failing)
    }

    /// Returns nothing, but only after `release` is called.
    pub fn blocking(source: Source) -> Arc<Self> {
        Self::with(source, Behavior::Blocking)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl JobCollector for FakeCollector {
    fn source(&self) -> Source {
        self.source
    }

    async fn collect(&self, _keywords: &[String]) -> Result<Vec<Posting>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        match &self.behavior {
            Behavior::Returning(postings) => Ok(postings.clone()),
            Behavior::Failing => Err(AppError::Scrape(format!("{} is down", self.source))),
            Behavior::Blocking => {
                self.gate.notified().await;
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    clock: Option<Arc<dyn Clock>>,
    shown: Mutex<Vec<(Alert, DateTime<Utc>)>>,
    cleared: Mutex<Vec<String>>,
    fail: AtomicBool,
    hold_at: Mutex<Option<usize>>,
    held: Notify,
    gate: Notify,
}

impl RecordingNotifications {
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock: Some(clock),
            ..Default::default()
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.shown.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
    }

    pub fn shown_at(&self) -> Vec<DateTime<Utc>> {
        self.shown.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn cleared(&self) -> Vec<String> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn fail_shows(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// The show with this zero-based index stalls until `release_show`.
    pub fn hold_show(&self, index: usize) {
        *self.hold_at.lock().unwrap() = Some(index);
    }

    pub async fn wait_held(&self) {
        self.held.notified().await;
    }

    pub fn release_show(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl NotificationService for RecordingNotifications {
    async fn show(&self, alert: Alert) -> Result<(), AppError> {
        let at = self.clock.as_ref().map_or_else(Utc::now, |c| c.now());
        // Recorded even when failing: the attempt is what pacing measures.
        let index = {
            let mut shown = self.shown.lock().unwrap();
            shown.push((alert, at));
            shown.len() - 1
        };
        if *self.hold_at.lock().unwrap() == Some(index) {
            self.held.notify_one();
            self.gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notification("simulated failure".to_string()));
        }
        Ok(())
    }

    async fn clear(&self, notification_id: &str) -> Result<(), AppError> {
        self.cleared.lock().unwrap().push(notification_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl UrlOpener for RecordingOpener {
    async fn open(&self, url: &str) -> Result<(), AppError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Serves canned HTML instead of fetching.
#[derive(Default)]
pub struct FakeBrowser {
    any_html: Mutex<Option<String>>,
    pages: Mutex<HashMap<ContextHandle, Page>>,
    handles: Mutex<Vec<(String, ContextHandle)>>,
    opened: Mutex<Vec<String>>,
    next: AtomicU64,
    fail: AtomicBool,
}

impl FakeBrowser {
    /// Any opened URL gets this document.
    pub fn serve_any(&self, html: &str) {
        *self.any_html.lock().unwrap() = Some(html.to_string());
    }

    /// Pretend a context is already open at `url`.
    pub fn preload(&self, url: &str, html: &str) {
        self.insert(url, html.to_string());
    }

    pub fn fail_opens(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    fn insert(&self, url: &str, html: String) -> ContextHandle {
        let handle = ContextHandle::from_raw(self.next.fetch_add(1, Ordering::SeqCst));
        self.pages.lock().unwrap().insert(
            handle,
            Page {
                url: url.to_string(),
                html,
            },
        );
        self.handles.lock().unwrap().push((url.to_string(), handle));
        handle
    }
}

#[async_trait]
impl BrowsingContext for FakeBrowser {
    async fn find_existing(&self, url_pattern: &str, search_url: &str) -> Option<ContextHandle> {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .find(|(url, _)| url == search_url && url.contains(url_pattern))
            .map(|(_, handle)| *handle)
    }

    async fn open(&self, url: &str) -> Result<ContextHandle, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Scrape(format!("cannot open {url}")));
        }
        self.opened.lock().unwrap().push(url.to_string());
        let html = self.any_html.lock().unwrap().clone().unwrap_or_default();
        Ok(self.insert(url, html))
    }

    async fn page(&self, handle: ContextHandle) -> Result<Page, AppError> {
        self.pages
            .lock()
            .unwrap()
            .get(&handle)
            .cloned()
            .ok_or_else(|| AppError::Scrape("no such context".to_string()))
    }
}

/// A runner wired to in-memory fakes.
pub struct Harness {
    pub kv: Arc<MemoryStore>,
    pub state: Arc<StateStore>,
    pub clock: Arc<ManualClock>,
    pub notifications: Arc<RecordingNotifications>,
    pub opener: Arc<RecordingOpener>,
    pub notifier: Arc<Notifier>,
    pub runner: Arc<DiscoveryRunner>,
}

impl Harness {
    pub fn new(collectors: Vec<Arc<FakeCollector>>) -> Self {
        let kv = Arc::new(MemoryStore::default());
        let state = Arc::new(StateStore::new(kv.clone(), Retention::default()));
        let clock = Arc::new(ManualClock::default());
        let notifications = Arc::new(RecordingNotifications::with_clock(clock.clone()));
        let opener = Arc::new(RecordingOpener::default());
        let notifier = Arc::new(Notifier::new(
            notifications.clone(),
            opener.clone(),
            state.clone(),
        ));
        let collectors = collectors
            .into_iter()
            .map(|c| c as Arc<dyn JobCollector>)
            .collect();
        let runner = Arc::new(DiscoveryRunner::new(
            collectors,
            state.clone(),
            notifier.clone(),
            clock.clone(),
        ));

        Self {
            kv,
            state,
            clock,
            notifications,
            opener,
            notifier,
            runner,
        }
    }

    /// The command facade over this harness, timer at 30 minutes.
    pub fn app(&self, api_token: Option<&str>) -> App {
        let scheduler = Arc::new(Scheduler::new(
            self.runner.clone(),
            Duration::from_secs(1800),
        ));
        App::new(
            self.state.clone(),
            scheduler,
            self.notifier.clone(),
            self.clock.clone(),
            api_token,
        )
    }

    /// Posting ids in notification order.
    pub fn notified_ids(&self) -> Vec<String> {
        self.notifications
            .alerts()
            .into_iter()
            .filter_map(|alert| alert.id.strip_prefix("job_").map(String::from))
            .collect()
    }
}
