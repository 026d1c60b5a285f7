use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::posting::Source;

pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 30;
pub const DEFAULT_KEYWORDS: [&str; 3] = ["developer", "engineer", "frontend"];

/// User-owned search configuration. Read-only to the discovery pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub keywords: Vec<String>,
    /// Minutes between scheduled checks.
    pub check_interval: u32,
    pub enabled_sites: Vec<Source>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            check_interval: DEFAULT_CHECK_INTERVAL_MINUTES,
            enabled_sites: Source::ALL.to_vec(),
        }
    }
}

/// Partial settings update as sent by the view layer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    pub keywords: Option<Vec<String>>,
    pub check_interval: Option<u32>,
    pub enabled_sites: Option<Vec<String>>,
}

impl Settings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.check_interval.max(1)) * 60)
    }

    /// Merge a patch into a copy of these settings, validating the result.
    pub fn merged(&self, patch: &UpdateSettings) -> Result<Settings, AppError> {
        let mut next = self.clone();

        if let Some(keywords) = &patch.keywords {
            next.keywords = normalize_keywords(keywords);
        }

        if let Some(minutes) = patch.check_interval {
            if minutes == 0 {
                return Err(AppError::BadRequest(
                    "checkInterval must be at least 1 minute".to_string(),
                ));
            }
            next.check_interval = minutes;
        }

        if let Some(sites) = &patch.enabled_sites {
            let mut parsed = Vec::with_capacity(sites.len());
            for site in sites {
                let source: Source = site.parse()?;
                if !parsed.contains(&source) {
                    parsed.push(source);
                }
            }
            next.enabled_sites = parsed;
        }

        Ok(next)
    }
}

/// Trim keywords, drop blanks and repeated entries (case-insensitive),
/// keeping the first spelling seen.
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() || out.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
            continue;
        }
        out.push(keyword.to_string());
    }
    out
}
