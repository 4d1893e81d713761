use serde::{Deserialize, Serialize};

use crate::users::dto::UserResponse;

/// Request body for login. `emailorphone` matches either column.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email_or_phone")]
    pub emailorphone: String,
    pub password: String,
}

/// Token plus the logged-in user.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Body for both password change and reset.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangePassword {
    pub new_password: String,
    pub new_password_confirm: String,
}
