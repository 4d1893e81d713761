use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{ChangePassword, ForgotPasswordRequest, LoginRequest, LoginResponse},
        extractors::AuthUser,
        services::{check_new_password, hash_password, verify_password},
    },
    error::{AppError, AppResult},
    response::{ApiJson, ApiResponse},
    state::AppState,
    users::{
        dto::{UserRequest, UserResponse},
        repo_types::{User, USER_ROLE_ID},
        services::prepare_new_user,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login/user", post(login_user))
        .route("/auth/login/admin", post(login_admin))
        .route("/auth/register", post(register))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/email-verify", post(email_verify))
        .route("/auth/activate-account/:id", put(activate_account))
        .route("/auth/change-password-login", put(change_password_login))
        .route("/auth/reset-password/:id", put(reset_password))
}

#[derive(Debug, Clone, Copy)]
enum Audience {
    EndUser,
    Staff,
}

/// Shared login flow; the audience decides which roles may sign in.
async fn login(
    state: &AppState,
    payload: LoginRequest,
    audience: Audience,
) -> AppResult<ApiJson<LoginResponse>> {
    let login = payload.emailorphone.trim().to_lowercase();
    if login.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "emailorphone and password cannot be blank".into(),
        ));
    }

    let Some(user) = state.users.find_by_login(&login).await? else {
        warn!(login = %login, "login unknown account");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    match audience {
        Audience::EndUser if !user.is_end_user() => {
            warn!(user_id = user.id, role_id = user.role_id, "staff account on user login");
            return Err(AppError::Forbidden("You are not a user".into()));
        }
        Audience::Staff if user.is_end_user() => {
            warn!(user_id = user.id, "end user on admin login");
            return Err(AppError::Forbidden("You are not admin".into()));
        }
        _ => {}
    }

    let token = state.tokens.encode(user.id)?;
    info!(user_id = user.id, ?audience, "user logged in");
    let user = UserResponse::build(user, state.storage.as_ref()).await;
    Ok(ApiResponse::ok(LoginResponse { token, user }, "Login Success"))
}

#[instrument(skip(state, payload))]
pub async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<ApiJson<LoginResponse>> {
    login(&state, payload, Audience::EndUser).await
}

#[instrument(skip(state, payload))]
pub async fn login_admin(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<ApiJson<LoginResponse>> {
    login(&state, payload, Audience::Staff).await
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> AppResult<ApiJson<UserResponse>> {
    let verified = payload.is_verify;
    let mut new = prepare_new_user(&state, payload, USER_ROLE_ID, verified).await?;
    new.status = 0;

    let user = state.users.create(new).await?;
    info!(user_id = user.id, email = %user.email, "user registered");
    let body = UserResponse::build(user, state.storage.as_ref()).await;
    Ok(ApiResponse::ok(body, "Register Success"))
}

/// Confirms the address is known. Delivery of the reset mail is out of scope
/// here, so nothing about the account is returned.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<ApiJson<()>> {
    let email = payload.email.trim().to_lowercase();
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::NotFound("email"))?;
    info!(user_id = user.id, "password reset requested");
    Ok(ApiResponse::message(
        "Password reset requested, please check your email",
    ))
}

#[instrument(skip(_state))]
pub async fn email_verify(
    State(_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<ApiJson<()>> {
    info!(user_id, "verification email requested");
    Ok(ApiResponse::message(
        "Email verification requested, please check your email",
    ))
}

async fn load_user(state: &AppState, id: i64) -> AppResult<User> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))
}

#[instrument(skip(state))]
pub async fn activate_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<ApiJson<UserResponse>> {
    let actor = auth.require_staff(&state).await?.id;
    let mut user = load_user(&state, id).await?;
    user.is_verify = true;
    user.status = 1;
    let user = state.users.update(&user).await?;
    info!(user_id = id, actor, "account activated");
    let body = UserResponse::build(user, state.storage.as_ref()).await;
    Ok(ApiResponse::ok(body, "Email Verification Success"))
}

async fn set_password(
    state: &AppState,
    user_id: i64,
    payload: ChangePassword,
) -> AppResult<ApiJson<UserResponse>> {
    check_new_password(&payload.new_password, &payload.new_password_confirm)?;
    let mut user = load_user(state, user_id).await?;
    user.password_hash = hash_password(&payload.new_password)?;
    let user = state.users.update(&user).await?;
    info!(user_id, "password changed");
    let body = UserResponse::build(user, state.storage.as_ref()).await;
    Ok(ApiResponse::ok(body, "Password Changed"))
}

#[instrument(skip(state, payload))]
pub async fn change_password_login(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePassword>,
) -> AppResult<ApiJson<UserResponse>> {
    set_password(&state, user_id, payload).await
}

/// Staff reset of another account's password.
#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ChangePassword>,
) -> AppResult<ApiJson<UserResponse>> {
    let actor = auth.require_staff(&state).await?.id;
    info!(user_id = id, actor, "password reset by staff");
    set_password(&state, id, payload).await
}
