use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::dto::{UserRequest, UserResponse, UserUpdateRequest};
use super::repo_types::{UserFilter, USER_PAGING, USER_ROLE_ID};
use super::services::{ensure_unique, prepare_new_user};
use crate::auth::extractors::AuthUser;
use crate::error::{AppError, AppResult};
use crate::paging::{Page, PageRequest};
use crate::response::{ApiJson, ApiResponse};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users).post(create_user))
        .route("/user/all", get(all_users))
        .route(
            "/user/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub force: bool,
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UserRequest>,
) -> AppResult<ApiJson<UserResponse>> {
    let actor = auth.require_staff(&state).await?.id;
    let role_id = if payload.role_id == 0 {
        USER_ROLE_ID
    } else {
        payload.role_id
    };
    let new = prepare_new_user(&state, payload, role_id, true).await?;
    let user = state.users.create(new).await?;
    info!(user_id = user.id, actor, "user created by admin");

    let body = UserResponse::build(user, state.storage.as_ref()).await;
    Ok(ApiResponse::ok(body, "Create User Success"))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<ApiJson<Page<UserResponse>>> {
    auth.require_staff(&state).await?;
    let req = PageRequest::from_query(&query, &USER_PAGING);
    let filter = UserFilter::filtered(&req);

    let total = state.users.count(&UserFilter::base(&req)).await?;
    let filtered = state.users.count(&filter).await?;
    let rows = state
        .users
        .find(&filter, req.sort, req.order, req.offset, req.limit)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for user in rows {
        items.push(UserResponse::build(user, state.storage.as_ref()).await);
    }
    Ok(ApiResponse::ok(
        Page::new(&req, items, total, filtered),
        "Get Users Success",
    ))
}

#[instrument(skip(state))]
pub async fn all_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<ApiJson<Vec<UserResponse>>> {
    auth.require_staff(&state).await?;
    let rows = state.users.list_all().await?;
    let mut items = Vec::with_capacity(rows.len());
    for user in rows {
        items.push(UserResponse::build(user, state.storage.as_ref()).await);
    }
    Ok(ApiResponse::ok(items, "Get All Users Success"))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<ApiJson<UserResponse>> {
    let actor = auth.load(&state).await?;
    if actor.is_end_user() && actor.id != id {
        return Err(AppError::Forbidden("You can only view your own account".into()));
    }
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let body = UserResponse::build(user, state.storage.as_ref()).await;
    Ok(ApiResponse::ok(body, "Get User Success"))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<ApiJson<UserResponse>> {
    let caller = auth.load(&state).await?;
    if caller.is_end_user() {
        if caller.id != id {
            return Err(AppError::Forbidden("You can only update your own account".into()));
        }
        if payload.touches_privileges() {
            warn!(user_id = caller.id, "end user tried to change role or verification");
            return Err(AppError::Forbidden(
                "Only staff can change role or verification".into(),
            ));
        }
    }
    let actor = caller.id;
    let mut user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    payload.apply(&mut user)?;
    ensure_unique(&state, &user.email, &user.phone, Some(user.id)).await?;

    let updated = state.users.update(&user).await?;
    info!(user_id = updated.id, actor, "user updated");
    let body = UserResponse::build(updated, state.storage.as_ref()).await;
    Ok(ApiResponse::ok(body, "Update User Success"))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Query(params): Query<DeleteParams>,
) -> AppResult<ApiJson<()>> {
    let actor = auth.require_staff(&state).await?.id;
    if !params.force {
        state.users.soft_delete(id).await?;
        info!(user_id = id, actor, "user deleted");
        return Ok(ApiResponse::message("Delete User Success"));
    }

    let user = state.users.hard_delete(id).await?;
    if !user.image.is_empty() {
        if let Err(e) = state.storage.delete_object(&user.image).await {
            warn!(error = %e, key = %user.image, "avatar removal failed");
        }
    }
    info!(user_id = id, actor, "user removed permanently");
    Ok(ApiResponse::message("Delete User Success"))
}
