use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Router,
};
use tracing::{instrument, warn};

use super::services::{store_uploads, UploadItem};
use crate::auth::extractors::AuthUser;
use crate::error::{AppError, AppResult};
use crate::response::{ApiJson, ApiResponse};
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/file/upload", post(upload))
        .route("/file/upload-multiple", post(upload_multiple))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Collects every part named `field` that carries a file.
async fn collect(mut multipart: Multipart, field: &str) -> AppResult<Vec<UploadItem>> {
    let mut items = Vec::new();
    while let Some(part) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "multipart read failed");
        AppError::Validation("Invalid multipart body".into())
    })? {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().unwrap_or_default().to_string();
        let body = part
            .bytes()
            .await
            .map_err(|_| AppError::Validation("Invalid multipart body".into()))?;
        items.push(UploadItem { file_name, body });
    }
    Ok(items)
}

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    multipart: Multipart,
) -> AppResult<ApiJson<String>> {
    let mut items = collect(multipart, "file").await?;
    items.truncate(1);
    let key = store_uploads(&state, items)
        .await?
        .pop()
        .ok_or_else(|| AppError::Validation("No files to upload".into()))?;
    Ok(ApiResponse::ok(key, "File uploaded successfully"))
}

#[instrument(skip(state, multipart))]
pub async fn upload_multiple(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    multipart: Multipart,
) -> AppResult<ApiJson<Vec<String>>> {
    let items = collect(multipart, "files").await?;
    let keys = store_uploads(&state, items).await?;
    Ok(ApiResponse::ok(keys, "Files uploaded successfully"))
}
