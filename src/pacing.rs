use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of time for everything that waits: settle delays and
/// notification spacing. Swapped for a manual clock in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Spaces out consecutive operations so that their start times are at least
/// `min_interval` apart.
pub struct Pacer {
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    last_start: Option<DateTime<Utc>>,
}

impl Pacer {
    pub fn new(clock: Arc<dyn Clock>, min_interval: Duration) -> Self {
        Self {
            clock,
            min_interval,
            last_start: None,
        }
    }

    /// Wait until the next operation may start, then mark it started.
    pub async fn wait_turn(&mut self) {
        if let Some(last) = self.last_start {
            let elapsed = (self.clock.now() - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.min_interval {
                self.clock.sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_start = Some(self.clock.now());
    }
}
