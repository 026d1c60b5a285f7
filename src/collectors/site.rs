use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::collectors::JobCollector;
use crate::collectors::browser::BrowsingContext;
use crate::collectors::extract::{Extractor, SelectorSet};
use crate::error::AppError;
use crate::models::posting::{Posting, Source};
use crate::pacing::Clock;

/// Characters that encodeURIComponent does NOT encode.
/// RFC 3986 unreserved: A-Z a-z 0-9 - _ . ! ~ * ' ( )
const ENCODE_URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Everything that differs between job boards.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub source: Source,
    /// Search URL up to and including the query parameter name.
    pub search_prefix: &'static str,
    /// Substring identifying an already-open context for this site.
    pub url_pattern: &'static str,
    /// Pause after opening a fresh context. Pages arrive fully fetched,
    /// so this paces requests rather than waiting for rendering.
    pub settle_delay: Duration,
    pub extractor: SelectorSet,
}

impl SiteProfile {
    pub fn search_url(&self, keywords: &[String]) -> String {
        let query = keywords.join(" ");
        format!(
            "{}{}",
            self.search_prefix,
            utf8_percent_encode(&query, ENCODE_URI_COMPONENT_SET)
        )
    }
}

/// Scrapes one job board through a browsing context.
pub struct SiteCollector {
    profile: SiteProfile,
    extractor: Extractor,
    browser: Arc<dyn BrowsingContext>,
    clock: Arc<dyn Clock>,
}

impl SiteCollector {
    pub fn new(profile: SiteProfile, browser: Arc<dyn BrowsingContext>, clock: Arc<dyn Clock>) -> Self {
        Self {
            extractor: Extractor::new(profile.source, &profile.extractor),
            profile,
            browser,
            clock,
        }
    }
}

#[async_trait]
impl JobCollector for SiteCollector {
    fn source(&self) -> Source {
        self.profile.source
    }

    async fn collect(&self, keywords: &[String]) -> Result<Vec<Posting>, AppError> {
        let url = self.profile.search_url(keywords);
        let handle = match self.browser.find_existing(self.profile.url_pattern, &url).await {
            Some(handle) => {
                tracing::debug!(source = %self.profile.source, "Reusing open context");
                handle
            }
            None => {
                tracing::debug!(source = %self.profile.source, "Opening {url}");
                let handle = self.browser.open(&url).await?;
                // The fetch is complete by now; the delay only spaces out
                // requests to the same board.
                self.clock.sleep(self.profile.settle_delay).await;
                handle
            }
        };

        let page = self.browser.page(handle).await?;
        Ok(self
            .extractor
            .extract(&page.html, &page.url, self.clock.now()))
    }
}
