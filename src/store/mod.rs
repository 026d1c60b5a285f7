// Persistence layer. A flat key-value record (the `KeyValueStore` seam)
// with a typed, single-writer view over it (`StateStore`).

pub mod sqlite;
pub mod state;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AppError;

pub use state::{Retention, StateStore};

/// Keys of the persisted record.
pub mod keys {
    pub const KEYWORDS: &str = "keywords";
    pub const CHECK_INTERVAL: &str = "checkInterval";
    pub const ENABLED_SITES: &str = "enabledSites";
    pub const LAST_CHECKED: &str = "lastChecked";
    pub const SAVED_JOBS: &str = "savedJobs";
    pub const SEEN_JOB_IDS: &str = "seenJobIds";
}

/// Flat JSON key-value storage. No transactions across calls; the last
/// write for a key wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, AppError>;

    /// Write every entry of a partial record.
    async fn set(&self, record: Map<String, Value>) -> Result<(), AppError>;
}
