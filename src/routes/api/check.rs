use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::app::App;
use crate::error::AppError;

/// POST /api/v1/check
///
/// Runs a discovery check out of schedule. Rejected with 409 while another
/// run is in flight.
pub async fn run(State(app): State<Arc<App>>) -> Result<Json<Value>, AppError> {
    let report = app.check_now().await?;
    Ok(Json(json!({ "success": true, "report": report })))
}
