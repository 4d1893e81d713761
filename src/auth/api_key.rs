use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// When an API key is configured, requests must carry `X-API-KEY` holding an
/// argon2 hash of it.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let valid = PasswordHash::new(presented)
        .map(|hash| {
            Argon2::default()
                .verify_password(expected.as_bytes(), &hash)
                .is_ok()
        })
        .unwrap_or(false);
    if !valid {
        debug!(uri = %request.uri(), "api key rejected");
        return Err(AppError::Forbidden("Invalid API key".into()));
    }
    Ok(next.run(request).await)
}
