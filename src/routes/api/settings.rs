use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::app::App;
use crate::error::AppError;
use crate::models::settings::{Settings, UpdateSettings};

pub async fn get(State(app): State<Arc<App>>) -> Result<Json<Settings>, AppError> {
    Ok(Json(app.settings().await?))
}

pub async fn update(
    State(app): State<Arc<App>>,
    Json(patch): Json<UpdateSettings>,
) -> Result<Json<Settings>, AppError> {
    Ok(Json(app.update_settings(&patch).await?))
}
