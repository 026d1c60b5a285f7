use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use async_trait::async_trait;
use notify_rust::{Notification, Timeout};
use tokio::sync::{mpsc, oneshot};

use crate::error::AppError;
use crate::notifier::{Alert, Interaction, NotificationService, SAVE_ACTION, VIEW_ACTION};

const APP_NAME: &str = "jobwatch";

/// Action keys, indexed like `Alert::actions`.
const ACTION_KEYS: [&str; 2] = ["view", "save"];

type Shown = oneshot::Sender<Result<(), String>>;

/// Counts threads parked on a notification waiting for the user.
struct ActionWaiters {
    outstanding: Arc<AtomicUsize>,
    max: usize,
}

/// One reserved waiter. Releases its place when dropped.
struct WaiterSlot {
    outstanding: Arc<AtomicUsize>,
}

impl ActionWaiters {
    fn new(max: usize) -> Self {
        Self {
            outstanding: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    fn reserve(&self) -> Option<WaiterSlot> {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|_| WaiterSlot {
                outstanding: self.outstanding.clone(),
            })
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

impl WaiterSlot {
    /// Run `f` on a detached thread that holds this slot. The thread is
    /// outside the runtime's blocking pool, so shutting the runtime down
    /// never waits on it.
    fn run(self, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>, AppError> {
        std::thread::Builder::new()
            .name("alert-waiter".to_string())
            .spawn(move || {
                let _slot = self;
                f();
            })
            .map_err(|e| AppError::Notification(format!("Failed to start alert waiter: {e}")))
    }
}

impl Drop for WaiterSlot {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Native desktop notifications. On freedesktop systems an alert with
/// actions gets a waiter thread that forwards the user's reaction as an
/// `Interaction`, up to `max_waiters` at once. Past that, and for alerts
/// without actions, the notification is display-only.
pub struct DesktopNotifier {
    interactions: mpsc::Sender<Interaction>,
    waiters: ActionWaiters,
}

impl DesktopNotifier {
    pub fn new(max_waiters: usize) -> (Self, mpsc::Receiver<Interaction>) {
        let (interactions, rx) = mpsc::channel(64);
        let notifier = Self {
            interactions,
            waiters: ActionWaiters::new(max_waiters),
        };
        (notifier, rx)
    }

    async fn dispatch<W, S>(&self, alert: Alert, wait: W, show: S) -> Result<(), AppError>
    where
        W: FnOnce(Notification, String, Shown, mpsc::Sender<Interaction>) + Send + 'static,
        S: FnOnce(Notification) -> Result<(), String> + Send + 'static,
    {
        let slot = if alert.actions.is_empty() {
            None
        } else {
            self.waiters.reserve()
        };

        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .summary(&alert.title)
            .body(&alert.body);

        let (shown_tx, shown_rx) = oneshot::channel();
        match slot {
            Some(slot) => {
                notification.timeout(Timeout::Never);
                for (key, label) in ACTION_KEYS.iter().zip(alert.actions.iter()) {
                    notification.action(key, label);
                }
                let interactions = self.interactions.clone();
                slot.run(move || wait(notification, alert.id, shown_tx, interactions))?;
            }
            None => {
                if !alert.actions.is_empty() {
                    tracing::debug!(
                        waiters = self.waiters.outstanding(),
                        "Showing {} without actions",
                        alert.id
                    );
                }
                tokio::task::spawn_blocking(move || {
                    let _ = shown_tx.send(show(notification));
                });
            }
        }

        shown_rx
            .await
            .map_err(|_| AppError::Notification("notification task ended early".to_string()))?
            .map_err(AppError::Notification)
    }
}

#[async_trait]
impl NotificationService for DesktopNotifier {
    async fn show(&self, alert: Alert) -> Result<(), AppError> {
        self.dispatch(alert, show_and_wait, show_only).await
    }

    async fn clear(&self, notification_id: &str) -> Result<(), AppError> {
        // The notification server dismisses an alert once an action is
        // invoked; there is no handle left to close.
        tracing::debug!("Cleared {notification_id}");
        Ok(())
    }
}

fn show_only(notification: Notification) -> Result<(), String> {
    notification.show().map(|_| ()).map_err(|e| e.to_string())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn show_and_wait(
    notification: Notification,
    notification_id: String,
    shown: Shown,
    interactions: mpsc::Sender<Interaction>,
) {
    let handle = match notification.show() {
        Ok(handle) => {
            let _ = shown.send(Ok(()));
            handle
        }
        Err(e) => {
            let _ = shown.send(Err(e.to_string()));
            return;
        }
    };

    handle.wait_for_action(|action| {
        let action = match action {
            "default" => None,
            key if key == ACTION_KEYS[VIEW_ACTION] => Some(VIEW_ACTION),
            key if key == ACTION_KEYS[SAVE_ACTION] => Some(SAVE_ACTION),
            // "__closed" or anything else: dismissed without interaction.
            _ => return,
        };
        let _ = interactions.blocking_send(Interaction {
            notification_id,
            action,
        });
    });
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn show_and_wait(
    notification: Notification,
    notification_id: String,
    shown: Shown,
    _interactions: mpsc::Sender<Interaction>,
) {
    // No action callbacks on this platform; the alert is display-only.
    tracing::debug!("Shown {notification_id} without interaction routing");
    let _ = shown.send(show_only(notification));
}
