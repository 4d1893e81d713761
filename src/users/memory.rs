use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::repo::{sort_column, UserRepository};
use super::repo_types::{NewUser, User, UserFilter};
use crate::error::{AppError, AppResult};
use crate::paging::SortOrder;

/// In-memory `UserRepository` with the same filter semantics as Postgres.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn live(u: &User) -> bool {
    u.deleted_at.is_none()
}

fn matches(u: &User, f: &UserFilter) -> bool {
    if !live(u) {
        return false;
    }
    if f.role.is_some_and(|r| u.role_id != r) {
        return false;
    }
    if f.status.is_some_and(|s| u.status != s) {
        return false;
    }
    if let Some(term) = &f.search {
        let term = term.to_lowercase();
        let hit = [&u.name, &u.email, &u.phone]
            .iter()
            .any(|v| v.to_lowercase().contains(&term));
        if !hit {
            return false;
        }
    }
    true
}

fn compare(a: &User, b: &User, column: &str) -> Ordering {
    match column {
        "name" => a.name.cmp(&b.name),
        "email" => a.email.cmp(&b.email),
        "phone" => a.phone.cmp(&b.phone),
        "role_id" => a.role_id.cmp(&b.role_id),
        "status" => a.status.cmp(&b.status),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.id.cmp(&b.id),
    }
}

fn unique_clash(users: &[User], candidate: &User) -> bool {
    users.iter().filter(|u| live(u) && u.id != candidate.id).any(|u| {
        u.email == candidate.email || (!candidate.phone.is_empty() && u.phone == candidate.phone)
    })
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let mut users = self.users.write().await;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            gender: new.gender,
            birth_date: new.birth_date,
            phone: new.phone,
            image: new.image,
            address: new.address,
            is_verify: new.is_verify,
            role_id: new.role_id,
            status: new.status,
            prov: new.prov,
            kab: new.kab,
            kec: new.kec,
            kel: new.kel,
            postal_code: new.postal_code,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        if unique_clash(&users, &user) {
            return Err(AppError::Conflict("Email or phone already exists".into()));
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| live(u) && u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| live(u) && u.email == email).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| live(u) && u.phone == phone).cloned())
    }

    async fn find_by_login(&self, email_or_phone: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| live(u) && (u.email == email_or_phone || u.phone == email_or_phone))
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| live(u)).cloned().collect())
    }

    async fn count(&self, filter: &UserFilter) -> AppResult<i64> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| matches(u, filter)).count() as i64)
    }

    async fn find(
        &self,
        filter: &UserFilter,
        sort: &str,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        let column = sort_column(sort);
        let mut rows: Vec<User> = users.iter().filter(|u| matches(u, filter)).cloned().collect();
        rows.sort_by(|a, b| match order {
            SortOrder::Asc => compare(a, b, column),
            SortOrder::Desc => compare(b, a, column),
        });
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let mut users = self.users.write().await;
        if unique_clash(&users, user) {
            return Err(AppError::Conflict("Email or phone already exists".into()));
        }
        let slot = users
            .iter_mut()
            .find(|u| live(u) && u.id == user.id)
            .ok_or(AppError::NotFound("user"))?;
        let mut next = user.clone();
        next.created_at = slot.created_at;
        next.updated_at = OffsetDateTime::now_utc();
        next.deleted_at = None;
        *slot = next.clone();
        Ok(next)
    }

    async fn soft_delete(&self, id: i64) -> AppResult<()> {
        let mut users = self.users.write().await;
        let slot = users
            .iter_mut()
            .find(|u| live(u) && u.id == id)
            .ok_or(AppError::NotFound("user"))?;
        slot.deleted_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    async fn hard_delete(&self, id: i64) -> AppResult<User> {
        let mut users = self.users.write().await;
        let idx = users
            .iter()
            .position(|u| u.id == id)
            .ok_or(AppError::NotFound("user"))?;
        Ok(users.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str, phone: &str, role_id: i64, status: i64) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            role_id,
            status,
            ..NewUser::default()
        }
    }

    async fn seeded() -> InMemoryUserRepository {
        let repo = InMemoryUserRepository::new();
        for u in [
            new_user("John Smith", "john@example.com", "0811", 3, 0),
            new_user("Johnny Cash", "cash@example.com", "0812", 3, 1),
            new_user("Alice", "alice@johnson.org", "0813", 1, 1),
            new_user("Bob", "bob@example.com", "0814", 3, 1),
        ] {
            repo.create(u).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn search_is_case_insensitive_across_columns() {
        let repo = seeded().await;
        let filter = UserFilter {
            search: Some("JOHN".into()),
            ..UserFilter::default()
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 3);

        let filter = UserFilter {
            role: Some(3),
            search: Some("john".into()),
            ..UserFilter::default()
        };
        let rows = repo.find(&filter, "name", SortOrder::Desc, 0, 10).await.unwrap();
        let names: Vec<_> = rows.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Johnny Cash", "John Smith"]);
    }

    #[tokio::test]
    async fn paging_window() {
        let repo = seeded().await;
        let rows = repo
            .find(&UserFilter::default(), "id", SortOrder::Asc, 2, 10)
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|u| u.id).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[tokio::test]
    async fn soft_deleted_rows_disappear() {
        let repo = seeded().await;
        repo.soft_delete(1).await.unwrap();
        assert!(repo.find_by_id(1).await.unwrap().is_none());
        assert_eq!(repo.count(&UserFilter::default()).await.unwrap(), 3);
        assert!(matches!(repo.soft_delete(1).await, Err(AppError::NotFound(_))));
        let removed = repo.hard_delete(1).await.unwrap();
        assert_eq!(removed.email, "john@example.com");
        assert!(removed.deleted_at.is_some());
        assert!(matches!(repo.hard_delete(1).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let repo = seeded().await;
        let err = repo
            .create(new_user("Other", "bob@example.com", "", 3, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
