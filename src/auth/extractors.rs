use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::repo_types::User;

/// Authenticated caller, carrying the user id decoded from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

/// `Authorization` must be exactly `Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?;

    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Ok(*token),
        _ => Err(AppError::Unauthorized("invalid auth scheme".into())),
    }
}

impl AuthUser {
    /// The caller's live record; a token for a deleted account is rejected.
    pub async fn load(self, state: &AppState) -> AppResult<User> {
        state
            .users
            .find_by_id(self.0)
            .await?
            .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))
    }

    /// Like `load`, but only staff (any role other than end user) pass.
    pub async fn require_staff(self, state: &AppState) -> AppResult<User> {
        let actor = self.load(state).await?;
        if actor.is_end_user() {
            warn!(user_id = actor.id, "end user on staff route");
            return Err(AppError::Forbidden("Staff access required".into()));
        }
        Ok(actor)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let user_id = state.tokens.decode(token)?;
        Ok(AuthUser(user_id))
    }
}
