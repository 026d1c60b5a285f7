use std::time::Duration;

use crate::collectors::extract::SelectorSet;
use crate::collectors::site::SiteProfile;
use crate::models::posting::Source;

pub const PROFILE: SiteProfile = SiteProfile {
    source: Source::Indeed,
    search_prefix: "https://www.indeed.com/jobs?q=",
    url_pattern: "indeed.com",
    settle_delay: Duration::from_secs(3),
    extractor: SelectorSet {
        cards: &[".job_seen_beacon", ".jobsearch-SerpJobCard", "[data-jk]"],
        title: &["h2 a", ".jobTitle", "[class*=\"jobTitle\"]"],
        company: &[
            ".companyName",
            "[data-testid=\"company-name\"]",
            "[class*=\"company\"]",
        ],
        location: &[
            ".companyLocation",
            "[data-testid=\"text-location\"]",
            "[class*=\"location\"]",
        ],
        salary: &[".salary-snippet", "[class*=\"salary\"]"],
        link: &["h2 a", "a.jcs-JobTitle", "a[href]"],
    },
};
