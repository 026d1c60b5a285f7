// Job board collectors and the discovery runner that drives them.

pub mod browser;
pub mod extract;
pub mod indeed;
pub mod linkedin;
pub mod runner;
pub mod site;
pub mod welcometothejungle;

use std::sync::Arc;

use async_trait::async_trait;

use crate::collectors::browser::BrowsingContext;
use crate::collectors::site::SiteCollector;
use crate::error::AppError;
use crate::models::posting::{Posting, Source};
use crate::pacing::Clock;

/// Trait that all job collectors must implement.
/// Each collector scrapes one source for the given keywords and returns the
/// postings it could extract, in page order.
#[async_trait]
pub trait JobCollector: Send + Sync {
    fn source(&self) -> Source;

    async fn collect(&self, keywords: &[String]) -> Result<Vec<Posting>, AppError>;
}

/// One collector per supported source, in source order.
pub fn site_collectors(
    browser: Arc<dyn BrowsingContext>,
    clock: Arc<dyn Clock>,
) -> Vec<Arc<dyn JobCollector>> {
    [
        welcometothejungle::PROFILE,
        linkedin::PROFILE,
        indeed::PROFILE,
    ]
    .into_iter()
    .map(|profile| {
        Arc::new(SiteCollector::new(profile, browser.clone(), clock.clone())) as Arc<dyn JobCollector>
    })
    .collect()
}
