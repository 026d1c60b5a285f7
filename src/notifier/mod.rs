pub mod desktop;
pub mod opener;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::models::posting::{Posting, Source};
use crate::store::StateStore;

const NOTIFICATION_PREFIX: &str = "job_";
pub const SALARY_PLACEHOLDER: &str = "Salary not specified";

/// Index of the "View Job" action.
pub const VIEW_ACTION: usize = 0;
/// Index of the "Save for Later" action.
pub const SAVE_ACTION: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Button labels, indexed by `VIEW_ACTION` / `SAVE_ACTION`. Empty for
    /// informational alerts.
    pub actions: Vec<String>,
}

/// A user reaction to an alert. `action` is `None` for a click on the
/// alert body.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub notification_id: String,
    pub action: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    Opened(String),
    Acknowledged,
    Unknown,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn show(&self, alert: Alert) -> Result<(), AppError>;

    async fn clear(&self, notification_id: &str) -> Result<(), AppError>;
}

/// Opens a URL for the user, outside the daemon.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), AppError>;
}

pub struct Notifier {
    service: Arc<dyn NotificationService>,
    opener: Arc<dyn UrlOpener>,
    state: Arc<StateStore>,
}

impl Notifier {
    pub fn new(
        service: Arc<dyn NotificationService>,
        opener: Arc<dyn UrlOpener>,
        state: Arc<StateStore>,
    ) -> Self {
        Self {
            service,
            opener,
            state,
        }
    }

    pub fn alert_for(posting: &Posting) -> Alert {
        Alert {
            id: format!("{NOTIFICATION_PREFIX}{}", posting.id),
            title: "New Job Alert!".to_string(),
            body: format!(
                "{}\n{} - {}\n{}",
                posting.title,
                posting.company,
                posting.location,
                posting.salary.as_deref().unwrap_or(SALARY_PLACEHOLDER)
            ),
            actions: vec!["View Job".to_string(), "Save for Later".to_string()],
        }
    }

    pub async fn notify(&self, posting: &Posting) -> Result<(), AppError> {
        self.service.show(Self::alert_for(posting)).await?;
        tracing::info!(id = %posting.id, "Notification sent for: {}", posting.title);
        Ok(())
    }

    pub fn welcome_alert() -> Alert {
        Alert {
            id: "welcome".to_string(),
            title: "Job alerts are on".to_string(),
            body: "Configure keywords and sites through the local API to tune your alerts."
                .to_string(),
            actions: Vec::new(),
        }
    }

    /// Shown once, the first time the daemon starts with an empty store.
    pub async fn welcome(&self) -> Result<(), AppError> {
        self.service.show(Self::welcome_alert()).await
    }

    /// Resolve an interaction back to the stored posting and act on it.
    /// The alert is cleared whatever the outcome.
    pub async fn handle_interaction(
        &self,
        interaction: &Interaction,
    ) -> Result<InteractionOutcome, AppError> {
        let outcome = self.resolve(interaction).await;
        if let Err(e) = self.service.clear(&interaction.notification_id).await {
            tracing::warn!("Failed to clear {}: {e}", interaction.notification_id);
        }
        outcome
    }

    async fn resolve(&self, interaction: &Interaction) -> Result<InteractionOutcome, AppError> {
        if interaction.action == Some(SAVE_ACTION) {
            // Every notified posting is already persisted by the check.
            tracing::info!("Job saved for later");
            return Ok(InteractionOutcome::Acknowledged);
        }
        if !matches!(interaction.action, None | Some(VIEW_ACTION)) {
            return Ok(InteractionOutcome::Unknown);
        }

        let Some(posting_id) = interaction.notification_id.strip_prefix(NOTIFICATION_PREFIX) else {
            return Ok(InteractionOutcome::Unknown);
        };
        let Some(posting) = self.state.find_saved(posting_id).await? else {
            tracing::warn!("No saved posting for notification {}", interaction.notification_id);
            return Ok(InteractionOutcome::Unknown);
        };

        self.opener.open(&posting.url).await?;
        Ok(InteractionOutcome::Opened(posting.url))
    }

    /// Route interactions until the sending side goes away.
    pub async fn listen(self: Arc<Self>, mut interactions: mpsc::Receiver<Interaction>) {
        while let Some(interaction) = interactions.recv().await {
            match self.handle_interaction(&interaction).await {
                Ok(outcome) => tracing::debug!(?interaction, ?outcome, "Handled interaction"),
                Err(e) => tracing::warn!(?interaction, "Failed to handle interaction: {e}"),
            }
        }
        tracing::debug!("Interaction channel closed");
    }
}

/// Posting used by the "test notification" command.
pub fn sample_posting(now: DateTime<Utc>) -> Posting {
    let mut posting = Posting::new(
        Source::WelcomeToTheJungle,
        "Test Job Notification",
        "Test Company",
        "Test Location",
        Some("50k-70k EUR".to_string()),
        "https://example.com",
        now,
    );
    posting.id = format!("test_{}", now.timestamp_millis());
    posting
}
