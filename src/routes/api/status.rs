use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::app::{App, Status};
use crate::error::AppError;

pub async fn get(State(app): State<Arc<App>>) -> Result<Json<Status>, AppError> {
    Ok(Json(app.status().await?))
}
