use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};

use crate::app::{App, PostingFilters};
use crate::error::AppError;
use crate::models::posting::Posting;

pub async fn list(
    State(app): State<Arc<App>>,
    Query(filters): Query<PostingFilters>,
) -> Result<Json<Vec<Posting>>, AppError> {
    Ok(Json(app.postings(&filters).await?))
}
