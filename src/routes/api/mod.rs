pub mod check;
pub mod notifications;
pub mod postings;
pub mod settings;
pub mod status;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::app::App;
use crate::auth::require_api_token;

pub fn router(app: Arc<App>) -> Router {
    let protected = Router::new()
        .route("/check", post(check::run))
        .route("/settings", get(settings::get).put(settings::update))
        .route("/notifications/test", post(notifications::test))
        .route("/postings", get(postings::list))
        .route("/status", get(status::get))
        .layer(middleware::from_fn_with_state(
            app.clone(),
            require_api_token,
        ))
        .with_state(app);

    Router::new().nest("/api/v1", protected)
}
