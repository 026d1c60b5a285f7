use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

#[cfg(test)]
impl ContextHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// A loaded document and the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

/// Loads pages and keeps them around so a collector can reuse a context
/// that is already pointed at its search.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// A live context opened at `search_url` whose current URL still
    /// contains `url_pattern`, if any. A context left on another search
    /// does not match.
    async fn find_existing(&self, url_pattern: &str, search_url: &str) -> Option<ContextHandle>;

    async fn open(&self, url: &str) -> Result<ContextHandle, AppError>;

    async fn page(&self, handle: ContextHandle) -> Result<Page, AppError>;
}

struct LoadedPage {
    requested: String,
    page: Page,
    loaded_at: Instant,
}

/// Browsing contexts backed by plain HTTP fetches. A context stays
/// reusable for `ttl`, after which the next check loads a fresh copy.
pub struct HttpBrowser {
    client: reqwest::Client,
    ttl: Duration,
    next_handle: AtomicU64,
    contexts: Mutex<HashMap<ContextHandle, LoadedPage>>,
}

impl HttpBrowser {
    pub fn new(user_agent: &str, ttl: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            ttl,
            next_handle: AtomicU64::new(1),
            contexts: Mutex::new(HashMap::new()),
        })
    }

    fn contexts(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ContextHandle, LoadedPage>>, AppError> {
        self.contexts
            .lock()
            .map_err(|_| AppError::Internal("browsing context table poisoned".to_string()))
    }
}

#[async_trait]
impl BrowsingContext for HttpBrowser {
    async fn find_existing(&self, url_pattern: &str, search_url: &str) -> Option<ContextHandle> {
        let mut contexts = self.contexts().ok()?;
        contexts.retain(|_, loaded| loaded.loaded_at.elapsed() < self.ttl);
        contexts
            .iter()
            .filter(|(_, loaded)| {
                loaded.requested == search_url && loaded.page.url.contains(url_pattern)
            })
            .max_by_key(|(_, loaded)| loaded.loaded_at)
            .map(|(handle, _)| *handle)
    }

    async fn open(&self, url: &str) -> Result<ContextHandle, AppError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AppError::Scrape(format!("{url} returned {}", resp.status())));
        }

        let final_url = resp.url().to_string();
        let html = resp.text().await?;

        let handle = ContextHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.contexts()?.insert(
            handle,
            LoadedPage {
                requested: url.to_string(),
                page: Page {
                    url: final_url,
                    html,
                },
                loaded_at: Instant::now(),
            },
        );
        tracing::debug!(?handle, "Opened browsing context for {url}");
        Ok(handle)
    }

    async fn page(&self, handle: ContextHandle) -> Result<Page, AppError> {
        self.contexts()?
            .get(&handle)
            .map(|loaded| loaded.page.clone())
            .ok_or_else(|| AppError::Scrape(format!("browsing context {handle:?} is gone")))
    }
}
