use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use super::repo_types::{NewUser, User, UserFilter, USER_SORTABLE};
use crate::error::{AppError, AppResult};
use crate::paging::{like_pattern, SortOrder};

const USER_COLUMNS: &str = "id, name, email, password_hash, gender, birth_date, phone, image, \
    address, is_verify, role_id, status, prov, kab, kec, kel, postal_code, \
    created_at, updated_at, deleted_at";

/// Persistence boundary for users. Lookups never return soft-deleted rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> AppResult<User>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<User>>;

    /// Login lookup: matches either the email or the phone column.
    async fn find_by_login(&self, email_or_phone: &str) -> AppResult<Option<User>>;

    async fn list_all(&self) -> AppResult<Vec<User>>;

    async fn count(&self, filter: &UserFilter) -> AppResult<i64>;

    async fn find(
        &self,
        filter: &UserFilter,
        sort: &str,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<User>>;

    /// Persist every mutable column of `user`.
    async fn update(&self, user: &User) -> AppResult<User>;

    async fn soft_delete(&self, id: i64) -> AppResult<()>;

    /// Removes the row outright, deleted or not, returning what was removed.
    async fn hard_delete(&self, id: i64) -> AppResult<User>;
}

/// Resolve `sort` against the whitelist; only static column names reach SQL.
pub(crate) fn sort_column(sort: &str) -> &'static str {
    USER_SORTABLE
        .iter()
        .copied()
        .find(|c| *c == sort)
        .unwrap_or("id")
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one_by(&self, column: &'static str, value: &str) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 AND deleted_at IS NULL LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE deleted_at IS NULL");
    if let Some(role) = filter.role {
        qb.push(" AND role_id = ").push_bind(role);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> AppResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, gender, birth_date, phone, image,
                               address, is_verify, role_id, status, prov, kab, kec, kel, postal_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.gender)
            .bind(user.birth_date)
            .bind(&user.phone)
            .bind(&user.image)
            .bind(&user.address)
            .bind(user.is_verify)
            .bind(user.role_id)
            .bind(user.status)
            .bind(user.prov)
            .bind(user.kab)
            .bind(user.kec)
            .bind(&user.kel)
            .bind(&user.postal_code)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict("Email or phone already exists".into()),
                other => other,
            })?;
        info!(user_id = created.id, email = %created.email, "user created");
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.find_one_by("email", email).await
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        self.find_one_by("phone", phone).await
    }

    async fn find_by_login(&self, email_or_phone: &str) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE (email = $1 OR phone = $1) AND deleted_at IS NULL \
             ORDER BY id LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email_or_phone)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn list_all(&self) -> AppResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.db).await?;
        Ok(users)
    }

    async fn count(&self, filter: &UserFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut qb, filter);
        let n: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.db).await?;
        Ok(n)
    }

    async fn find(
        &self,
        filter: &UserFilter,
        sort: &str,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY ")
            .push(sort_column(sort))
            .push(" ")
            .push(order.as_sql())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        debug!(sql = qb.sql(), "user page query");
        let users = qb.build_query_as::<User>().fetch_all(&self.db).await?;
        Ok(users)
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET name = $2, email = $3, password_hash = $4, gender = $5, birth_date = $6,
                   phone = $7, image = $8, address = $9, is_verify = $10, role_id = $11,
                   status = $12, prov = $13, kab = $14, kec = $15, kel = $16,
                   postal_code = $17, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.gender)
            .bind(user.birth_date)
            .bind(&user.phone)
            .bind(&user.image)
            .bind(&user.address)
            .bind(user.is_verify)
            .bind(user.role_id)
            .bind(user.status)
            .bind(user.prov)
            .bind(user.kab)
            .bind(user.kec)
            .bind(&user.kel)
            .bind(&user.postal_code)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        debug!(user_id = updated.id, "user updated");
        Ok(updated)
    }

    async fn soft_delete(&self, id: i64) -> AppResult<()> {
        let res = sqlx::query(
            "UPDATE users SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("user"));
        }
        info!(user_id = id, "user soft-deleted");
        Ok(())
    }

    async fn hard_delete(&self, id: i64) -> AppResult<User> {
        let sql = format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}");
        let removed = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        info!(user_id = id, "user removed");
        Ok(removed)
    }
}
