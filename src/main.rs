mod app;
mod auth;
mod collectors;
mod config;
mod db;
mod error;
mod models;
mod notifier;
mod pacing;
mod routes;
mod scheduler;
mod store;
#[cfg(test)]
mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::collectors::browser::HttpBrowser;
use crate::collectors::runner::DiscoveryRunner;
use crate::config::{Command, Config};
use crate::notifier::Notifier;
use crate::notifier::desktop::DesktopNotifier;
use crate::notifier::opener::SystemOpener;
use crate::pacing::{Clock, SystemClock};
use crate::scheduler::Scheduler;
use crate::store::StateStore;
use crate::store::sqlite::SqliteStore;

/// Alerts that can still route a click at the same time.
const ALERT_WAITERS: usize = 64;

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(pool: SqlitePool) -> impl IntoResponse {
    let result: Result<(i64,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobwatch=info,tower_http=info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);

    tracing::info!("Opening database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    let state = Arc::new(StateStore::new(
        Arc::new(SqliteStore::new(pool.clone())),
        config.retention(),
    ));
    let first_start = state.initialize().await?;

    let command = config.resolved_command();
    // One-shot commands exit right after showing alerts, so nothing would
    // be left to route a click.
    let max_waiters = match command {
        Command::Serve { .. } => ALERT_WAITERS,
        Command::Check | Command::TestNotification => 0,
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (desktop, interactions) = DesktopNotifier::new(max_waiters);
    let notifier = Arc::new(Notifier::new(
        Arc::new(desktop),
        Arc::new(SystemOpener),
        state.clone(),
    ));
    tokio::spawn(notifier.clone().listen(interactions));

    let browser = Arc::new(HttpBrowser::new(
        &config.user_agent,
        Duration::from_secs(config.context_ttl_secs),
    )?);
    let runner = Arc::new(DiscoveryRunner::new(
        collectors::site_collectors(browser, clock.clone()),
        state.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    let settings = state.settings().await?;
    let scheduler = Arc::new(Scheduler::new(runner, settings.interval()));

    match command {
        Command::Check => {
            let report = scheduler.check_now().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::TestNotification => {
            let app = App::new(state, scheduler, notifier, clock, None);
            let posting = app.test_notification().await?;
            tracing::info!(id = %posting.id, "Test notification sent");
        }
        Command::Serve {
            listen_addr,
            api_token,
        } => {
            if first_start {
                if let Err(e) = notifier.welcome().await {
                    tracing::warn!("Failed to show welcome notification: {e}");
                }
            }
            if api_token.is_none() {
                tracing::warn!("API_TOKEN not set, the local API accepts any caller");
            }

            let app = Arc::new(App::new(
                state,
                scheduler.clone(),
                notifier,
                clock,
                api_token.as_deref(),
            ));

            let (stop_timer, timer_stopped) = tokio::sync::oneshot::channel::<()>();
            let timer = tokio::spawn(scheduler.run_until(async move {
                let _ = timer_stopped.await;
            }));
            tracing::info!(
                "Checking every {} minutes for {:?}",
                settings.check_interval,
                settings.keywords
            );

            let readyz_pool = pool.clone();
            let router = Router::new()
                .route("/healthz", get(healthz))
                .route("/readyz", get(move || readyz(readyz_pool.clone())))
                .merge(routes::api::router(app))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {listen_addr}");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            let _ = stop_timer.send(());
            timer.await?;
        }
    }

    pool.close().await;
    Ok(())
}
