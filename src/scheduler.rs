use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::collectors::runner::{DiscoveryRunner, RunReport};
use crate::error::AppError;

/// Owns the one recurring check timer and guarantees that at most one
/// discovery run is in flight, scheduled or manual.
pub struct Scheduler {
    runner: Arc<DiscoveryRunner>,
    run_guard: Arc<Mutex<()>>,
    running: Arc<AtomicBool>,
    current_cancel: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    period: watch::Sender<Duration>,
}

/// Held by the task driving a run; clears the running flag on drop.
struct RunSlot {
    _guard: OwnedMutexGuard<()>,
    running: Arc<AtomicBool>,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn new(runner: Arc<DiscoveryRunner>, period: Duration) -> Self {
        let (period, _) = watch::channel(period);
        Self {
            runner,
            run_guard: Arc::new(Mutex::new(())),
            running: Arc::new(AtomicBool::new(false)),
            current_cancel: Arc::new(Mutex::new(None)),
            period,
        }
    }

    /// Run a check now unless one is already running.
    ///
    /// The run itself lives on its own task: dropping the returned future
    /// (a client hanging up, say) leaves the run to finish and persist.
    pub async fn check_now(&self) -> Result<RunReport, AppError> {
        let guard = self
            .run_guard
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::RunInProgress)?;
        self.running.store(true, Ordering::SeqCst);
        let slot = RunSlot {
            _guard: guard,
            running: self.running.clone(),
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let runner = self.runner.clone();
        let current_cancel = self.current_cancel.clone();
        *current_cancel.lock().await = Some(cancel.clone());

        let run = tokio::spawn(async move {
            let result = runner.run_check(&cancel).await;
            *current_cancel.lock().await = None;
            drop(slot);
            result
        });

        run.await
            .map_err(|e| AppError::Internal(format!("Check task failed: {e}")))?
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn period(&self) -> Duration {
        *self.period.borrow()
    }

    /// Replace the timer period. The running timer is dropped and a new one
    /// starts a full period from now.
    pub fn reschedule(&self, period: Duration) {
        self.period.send_replace(period);
        tracing::info!("Alarm updated: check every {} minutes", period.as_secs() / 60);
    }

    /// Ask the in-flight run, if any, to stop at its next checkpoint.
    pub async fn cancel_current(&self) {
        if let Some(cancel) = self.current_cancel.lock().await.as_ref() {
            cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Drive the timer until `shutdown` resolves.
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut period_rx = self.period.subscribe();
        tokio::pin!(shutdown);

        loop {
            let period = *period_rx.borrow_and_update();
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        tracing::info!("Scheduler stopping");
                        self.cancel_current().await;
                        return;
                    }
                    changed = period_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::info!("Alarm triggered - checking for jobs");
                        let scheduler = self.clone();
                        tokio::spawn(async move { scheduler.scheduled_check().await });
                    }
                }
            }
        }
    }

    async fn scheduled_check(&self) {
        match self.check_now().await {
            Ok(report) => tracing::info!(
                run_id = %report.run_id,
                found = report.found,
                new = report.new,
                "Scheduled check finished"
            ),
            Err(AppError::RunInProgress) => {
                tracing::warn!("Previous check still running, skipping this tick")
            }
            Err(e) => tracing::error!("Scheduled check failed: {e}"),
        }
    }
}
