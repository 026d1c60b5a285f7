use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only log of checks: epoch milliseconds -> new postings found.
/// Persisted as a JSON object with stringified timestamp keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckLog(BTreeMap<i64, u32>);

impl CheckLog {
    pub fn record(&mut self, checked_at: DateTime<Utc>, new_postings: u32) {
        self.0.insert(checked_at.timestamp_millis(), new_postings);
    }

    pub fn latest(&self) -> Option<(DateTime<Utc>, u32)> {
        let (millis, count) = self.0.iter().next_back()?;
        DateTime::from_timestamp_millis(*millis).map(|at| (at, *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Keep only the newest `max` entries. Zero keeps everything.
    pub fn trim(&mut self, max: usize) {
        while max > 0 && self.0.len() > max {
            self.0.pop_first();
        }
    }
}
