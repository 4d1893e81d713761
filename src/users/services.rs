use tracing::warn;

use super::dto::{parse_birth_date, UserRequest};
use super::repo_types::NewUser;
use crate::auth::services::{hash_password, is_valid_email};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Fails with `Conflict` when another live user already owns `email` or a
/// non-empty `phone`. `except` skips the user being updated.
pub async fn ensure_unique(
    state: &AppState,
    email: &str,
    phone: &str,
    except: Option<i64>,
) -> AppResult<()> {
    let other = |id: i64| except != Some(id);

    if let Some(u) = state.users.find_by_email(email).await? {
        if other(u.id) {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict("Email already exists".into()));
        }
    }
    if !phone.is_empty() {
        if let Some(u) = state.users.find_by_phone(phone).await? {
            if other(u.id) {
                warn!(phone = %phone, "phone already registered");
                return Err(AppError::Conflict("Phone already exists".into()));
            }
        }
    }
    Ok(())
}

/// Validates a creation body and turns it into an insert payload with the
/// given role and verification state.
pub async fn prepare_new_user(
    state: &AppState,
    mut req: UserRequest,
    role_id: i64,
    verified: bool,
) -> AppResult<NewUser> {
    req.normalize()?;
    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    ensure_unique(state, &req.email, &req.phone, None).await?;

    Ok(NewUser {
        birth_date: parse_birth_date(&req.birth_date)?,
        password_hash: hash_password(&req.password)?,
        name: req.name,
        email: req.email,
        gender: req.gender,
        phone: req.phone,
        image: req.image,
        address: req.address,
        is_verify: verified,
        role_id,
        status: i64::from(verified),
        prov: req.prov,
        kab: req.kab,
        kec: req.kec,
        kel: req.kel,
        postal_code: req.postal_code,
    })
}
