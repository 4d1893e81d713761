use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const ALLOWED_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/jpg", "image/png"];

pub struct UploadItem {
    pub file_name: String,
    pub body: Bytes,
}

/// Content type from the leading bytes; the client's claim is ignored.
pub fn sniff_mime(head: &[u8]) -> &'static str {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    if head.starts_with(b"%PDF-") {
        "application/pdf"
    } else if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if head.starts_with(PNG) {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

fn ext_from_mime(ct: &str) -> &'static str {
    match ct {
        "application/pdf" => "pdf",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}

/// `{random10}_{name}`: spaces dropped, directory parts stripped.
pub fn storage_key(file_name: &str, mime: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace(' ', "");
    let base = if base.is_empty() || base == "." || base == ".." {
        format!("file.{}", ext_from_mime(mime))
    } else {
        base
    };
    let prefix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{prefix}_{base}")
}

fn check_type(item: &UploadItem) -> AppResult<&'static str> {
    let mime = sniff_mime(&item.body[..item.body.len().min(512)]);
    if ALLOWED_TYPES.contains(&mime) {
        Ok(mime)
    } else {
        warn!(file = %item.file_name, detected = mime, "upload rejected");
        Err(AppError::Validation(format!(
            "File {} has an invalid type. Only PDF, JPEG, JPG, and PNG are accepted.",
            item.file_name
        )))
    }
}

/// Validates every item before storing any of them; returns the stored keys.
pub async fn store_uploads(st: &AppState, items: Vec<UploadItem>) -> AppResult<Vec<String>> {
    if items.is_empty() {
        return Err(AppError::Validation("No files to upload".into()));
    }
    let mimes = items.iter().map(check_type).collect::<AppResult<Vec<_>>>()?;

    let mut keys = Vec::with_capacity(items.len());
    for (item, mime) in items.into_iter().zip(mimes) {
        let key = storage_key(&item.file_name, mime);
        st.storage
            .put_object(&key, item.body, mime)
            .await
            .map_err(AppError::internal)?;
        info!(key = %key, mime, "file uploaded");
        keys.push(key);
    }
    Ok(keys)
}
