use std::time::Duration;

use crate::collectors::extract::SelectorSet;
use crate::collectors::site::SiteProfile;
use crate::models::posting::Source;

pub const PROFILE: SiteProfile = SiteProfile {
    source: Source::LinkedIn,
    search_prefix: "https://www.linkedin.com/jobs/search/?keywords=",
    url_pattern: "linkedin.com/jobs",
    settle_delay: Duration::from_secs(4),
    extractor: SelectorSet {
        cards: &[
            ".job-card-container",
            ".jobs-search-results__list-item",
            "[data-job-id]",
            ".job-search-card",
        ],
        title: &[".job-card-list__title", "h3", "[class*=\"job-title\"]"],
        company: &[
            ".job-card-container__company-name",
            "h4",
            "[class*=\"company\"]",
        ],
        location: &[
            ".job-card-container__metadata-item",
            ".job-search-card__location",
            "[class*=\"location\"]",
        ],
        salary: &[".job-search-card__salary-info", "[class*=\"salary\"]"],
        link: &["a.base-card__full-link", "a"],
    },
};
