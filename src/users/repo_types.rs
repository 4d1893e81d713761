use sqlx::FromRow;
use time::{Date, OffsetDateTime};

use crate::paging::{PageRequest, PagingDefaults, SortOrder};

/// Role id held by self-registered end users; every other role is staff.
pub const USER_ROLE_ID: i64 = 3;

pub const USER_SORTABLE: &[&str] = &[
    "id",
    "name",
    "email",
    "phone",
    "role_id",
    "status",
    "created_at",
    "updated_at",
];

pub const USER_PAGING: PagingDefaults = PagingDefaults {
    sort: "id",
    order: SortOrder::Asc,
    sortable: USER_SORTABLE,
    custom: "status",
};

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String, // argon2, never leaves the service
    pub gender: String,
    pub birth_date: Option<Date>,
    pub phone: String,
    pub image: String, // storage key, empty when unset
    pub address: String,
    pub is_verify: bool,
    pub role_id: i64,
    pub status: i64,
    pub prov: i64,
    pub kab: i64,
    pub kec: i64,
    pub kel: String,
    pub postal_code: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl User {
    pub fn is_end_user(&self) -> bool {
        self.role_id == USER_ROLE_ID
    }
}

/// Insert payload; the password is already hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub gender: String,
    pub birth_date: Option<Date>,
    pub phone: String,
    pub image: String,
    pub address: String,
    pub is_verify: bool,
    pub role_id: i64,
    pub status: i64,
    pub prov: i64,
    pub kab: i64,
    pub kec: i64,
    pub kel: String,
    pub postal_code: String,
}

/// Semantic list predicate; the repository turns it into bound parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<i64>,
    pub status: Option<i64>,
    /// Raw search term, matched case-insensitively against name/email/phone.
    pub search: Option<String>,
}

impl UserFilter {
    /// Scope for the unfiltered total: role only.
    pub fn base(req: &PageRequest) -> Self {
        Self {
            role: req.role,
            ..Self::default()
        }
    }

    /// Scope for the filtered count and the page itself.
    pub fn filtered(req: &PageRequest) -> Self {
        Self {
            role: req.role,
            status: req.custom,
            search: req.search.clone(),
        }
    }
}
