use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use crate::app::App;
use crate::error::AppError;

/// Hash a raw API token for comparison.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Middleware that validates the Bearer token against the configured one.
/// Without a configured token every request passes.
pub async fn require_api_token(
    State(app): State<Arc<App>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = app.api_token_hash() else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if hash_token(token) != expected {
        tracing::warn!("Rejected request with invalid API token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
