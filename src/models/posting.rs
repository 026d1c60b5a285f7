use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Query parameters that carry click tracking rather than posting identity.
const TRACKING_PARAMS: &[&str] = &["refId", "trackingId", "trk", "from", "fbclid", "gclid"];

/// Hex characters of the URL digest kept in a posting id.
const ID_DIGEST_LEN: usize = 16;

/// A job board we know how to scrape. Declaration order is the order
/// sources are visited during a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "welcometothejungle")]
    WelcomeToTheJungle,
    #[serde(rename = "linkedin")]
    LinkedIn,
    #[serde(rename = "indeed")]
    Indeed,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::WelcomeToTheJungle, Source::LinkedIn, Source::Indeed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::WelcomeToTheJungle => "welcometothejungle",
            Source::LinkedIn => "linkedin",
            Source::Indeed => "indeed",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(format!("Unknown job site '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    pub url: String,
    pub source: Source,
    pub discovered_at: DateTime<Utc>,
}

impl Posting {
    pub fn new(
        source: Source,
        title: impl Into<String>,
        company: impl Into<String>,
        location: impl Into<String>,
        salary: Option<String>,
        url: impl Into<String>,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        Self {
            id: posting_id(source, &url),
            title: title.into(),
            company: company.into(),
            location: location.into(),
            salary,
            url,
            source,
            discovered_at,
        }
    }
}

/// Stable identity of a posting: the source tag plus a digest of the
/// normalized URL. The same listing scraped on two different checks maps to
/// the same id.
pub fn posting_id(source: Source, url: &str) -> String {
    let digest = hex::encode(Sha256::digest(normalize_url(url).as_bytes()));
    format!("{}_{}", source.as_str(), &digest[..ID_DIGEST_LEN])
}

/// Canonical form of a posting URL. Unparseable input is only trimmed.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}
