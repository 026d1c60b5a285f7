use std::time::Duration;

use crate::collectors::extract::SelectorSet;
use crate::collectors::site::SiteProfile;
use crate::models::posting::Source;

pub const PROFILE: SiteProfile = SiteProfile {
    source: Source::WelcomeToTheJungle,
    search_prefix: "https://www.welcometothejungle.com/en/jobs?query=",
    url_pattern: "welcometothejungle.com",
    settle_delay: Duration::from_secs(3),
    extractor: SelectorSet {
        cards: &[
            "[data-testid=\"job-card\"]",
            ".job-card",
            "[class*=\"JobCard\"]",
            "article[data-testid*=\"job\"]",
        ],
        title: &[
            "h3",
            "h2",
            "[data-testid*=\"title\"]",
            ".job-title",
            "[class*=\"Title\"]",
        ],
        company: &[
            "[data-testid*=\"company\"]",
            ".company-name",
            "[class*=\"Company\"]",
        ],
        location: &[
            "[data-testid*=\"location\"]",
            ".location",
            "[class*=\"Location\"]",
        ],
        salary: &["[data-testid*=\"salary\"]", "[class*=\"Salary\"]"],
        link: &["a[href*=\"/jobs/\"]"],
    },
};

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::collectors::extract::Extractor;

    #[test]
    fn extracts_search_results_markup() {
        let html = r#"
            <ul>
              <li data-testid="search-results-list-item-wrapper">
                <article data-testid="job-card-article" class="sc-JobCardWrapper">
                  <a href="/en/companies/doctolib/jobs/senior-frontend-engineer_paris">
                    <h2>Senior Frontend Engineer</h2>
                  </a>
                  <span class="sc-CompanyName">Doctolib</span>
                  <p data-testid="job-location">Paris</p>
                </article>
              </li>
            </ul>"#;

        let postings = Extractor::new(PROFILE.source, &PROFILE.extractor).extract(
            html,
            "https://www.welcometothejungle.com/en/jobs?query=frontend",
            Utc::now(),
        );

        assert_eq!(postings.len(), 1);
        let posting = &postings[0];
        assert_eq!(posting.title, "Senior Frontend Engineer");
        assert_eq!(posting.company, "Doctolib");
        assert_eq!(posting.location, "Paris");
        assert_eq!(
            posting.url,
            "https://www.welcometothejungle.com/en/companies/doctolib/jobs/senior-frontend-engineer_paris"
        );
    }
}
