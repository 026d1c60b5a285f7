use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scrape failed: {0}")]
    Scrape(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("A check is already running")]
    RunInProgress,

    #[error("Check cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Http(_) | AppError::Scrape(_) | AppError::Notification(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RunInProgress => StatusCode::CONFLICT,
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // The view layer only ever checks `success` and shows `error`.
        let body = axum::Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}
