use crate::state::AppState;
use axum::Router;

pub mod api_key;
mod claims;
mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod services;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
