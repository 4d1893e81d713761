use axum::{http::StatusCode, Json};
use serde::Serialize;

/// `{status, message, data}` body shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiJson<T> = Json<ApiResponse<T>>;

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> ApiJson<T> {
        Json(Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> ApiJson<()> {
        Json(Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: None,
        })
    }
}
