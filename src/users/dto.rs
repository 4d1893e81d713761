use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, PrimitiveDateTime,
};

use super::repo_types::User;
use crate::error::{AppError, AppResult};
use crate::storage::StorageClient;

/// Body for registration and administrative creation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    #[serde(alias = "tgl_lahir")]
    pub birth_date: String,
    pub image: String,
    pub phone: String,
    pub address: String,
    pub role_id: i64,
    pub is_verify: bool,
    pub prov: i64,
    pub kab: i64,
    pub kec: i64,
    pub kel: String,
    pub postal_code: String,
}

impl UserRequest {
    /// Trims identity fields and checks the required ones.
    pub fn normalize(&mut self) -> AppResult<()> {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.phone = self.phone.trim().to_string();

        let mut missing = Vec::new();
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.email.is_empty() {
            missing.push("email");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "{} cannot be blank",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// Partial update: empty strings, zero ids and an absent `is_verify` leave
/// the column unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdateRequest {
    pub name: String,
    pub email: String,
    pub gender: String,
    #[serde(alias = "tgl_lahir")]
    pub birth_date: String,
    pub image: String,
    pub phone: String,
    pub address: String,
    pub role_id: i64,
    pub is_verify: Option<bool>,
    pub prov: i64,
    pub kab: i64,
    pub kec: i64,
    pub kel: String,
    pub postal_code: String,
}

impl UserUpdateRequest {
    /// Role and verification changes are reserved for staff.
    pub fn touches_privileges(&self) -> bool {
        self.role_id != 0 || self.is_verify.is_some()
    }

    /// Copies the non-empty fields onto `user`. Uniqueness is checked by the caller.
    pub fn apply(self, user: &mut User) -> AppResult<()> {
        fn set(dst: &mut String, src: String) {
            if !src.trim().is_empty() {
                *dst = src.trim().to_string();
            }
        }
        fn set_id(dst: &mut i64, src: i64) {
            if src != 0 {
                *dst = src;
            }
        }

        if !self.birth_date.trim().is_empty() {
            user.birth_date = parse_birth_date(&self.birth_date)?;
        }
        set(&mut user.name, self.name);
        set(&mut user.email, self.email.to_lowercase());
        set(&mut user.gender, self.gender);
        set(&mut user.image, self.image);
        set(&mut user.phone, self.phone);
        set(&mut user.address, self.address);
        set(&mut user.kel, self.kel);
        set(&mut user.postal_code, self.postal_code);
        set_id(&mut user.role_id, self.role_id);
        set_id(&mut user.prov, self.prov);
        set_id(&mut user.kab, self.kab);
        set_id(&mut user.kec, self.kec);

        if let Some(verified) = self.is_verify {
            user.is_verify = verified;
            user.status = i64::from(verified);
        }
        Ok(())
    }
}

/// `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`; blank means unset.
pub fn parse_birth_date(raw: &str) -> AppResult<Option<Date>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let with_time = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let date_only = format_description!("[year]-[month]-[day]");
    PrimitiveDateTime::parse(raw, with_time)
        .map(|dt| dt.date())
        .or_else(|_| Date::parse(raw, date_only))
        .map(Some)
        .map_err(|_| AppError::Validation("Invalid birth date format".into()))
}

/// Client view of a user: no password hash, avatar as a fetchable URL.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub image: String,
    pub gender: String,
    pub birth_date: Option<String>,
    pub phone: String,
    pub address: String,
    pub role_id: i64,
    pub is_verify: bool,
    pub status: i64,
    pub prov: i64,
    pub kab: i64,
    pub kec: i64,
    pub kel: String,
    pub postal_code: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserResponse {
    fn from_user(user: User, image: String) -> Self {
        let date_fmt = format_description!("[year]-[month]-[day]");
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            image,
            gender: user.gender,
            birth_date: user.birth_date.and_then(|d| d.format(date_fmt).ok()),
            phone: user.phone,
            address: user.address,
            role_id: user.role_id,
            is_verify: user.is_verify,
            status: user.status,
            prov: user.prov,
            kab: user.kab,
            kec: user.kec,
            kel: user.kel,
            postal_code: user.postal_code,
            created_at: user.created_at.format(&Rfc3339).unwrap_or_default(),
            updated_at: user.updated_at.format(&Rfc3339).unwrap_or_default(),
        }
    }

    /// Resolves the stored image key through `storage`; an unresolvable key
    /// is logged and rendered as an empty string.
    pub async fn build(user: User, storage: &dyn StorageClient) -> Self {
        let image = if user.image.is_empty() {
            String::new()
        } else {
            match storage.public_url(&user.image).await {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(error = %e, key = %user.image, "image url failed");
                    String::new()
                }
            }
        };
        Self::from_user(user, image)
    }
}
