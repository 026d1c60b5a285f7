use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::app::App;
use crate::error::AppError;

/// POST /api/v1/notifications/test
pub async fn test(State(app): State<Arc<App>>) -> Result<Json<Value>, AppError> {
    let posting = app.test_notification().await?;
    Ok(Json(json!({ "success": true, "posting": posting })))
}
