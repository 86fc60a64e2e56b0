use anyhow::Context;
use async_trait::async_trait;
use regex::RegexBuilder;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User, UserChanges, UserFilter};

/// In-process store keeping records in insertion order.
///
/// Every write runs under the single write lock, so the uniqueness check and
/// the mutation it guards are atomic.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// First unique field of `candidate` already held by a record other than `skip`.
fn conflicting_field(users: &[User], candidate: &User, skip: Option<Uuid>) -> Option<&'static str> {
    for other in users.iter().filter(|u| Some(u.oid) != skip) {
        if other.id == candidate.id {
            return Some("id");
        }
        if other.email == candidate.email {
            return Some("email");
        }
    }
    None
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let record = User {
            oid: Uuid::new_v4(),
            id: user.id,
            name: user.name,
            age: user.age,
            email: user.email,
            is_active: user.is_active,
        };
        let mut users = self.users.write().await;
        if let Some(field) = conflicting_field(&users, &record, None) {
            return Err(StoreError::Duplicate { field });
        }
        users.push(record.clone());
        Ok(record)
    }

    async fn find_by_oid(&self, oid: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.oid == oid).cloned())
    }

    async fn find(&self, filter: UserFilter) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let matched = match filter {
            UserFilter::All => users.clone(),
            UserFilter::NameContains(text) => {
                let re = RegexBuilder::new(&regex::escape(&text))
                    .case_insensitive(true)
                    .build()
                    .context("compile name pattern")?;
                users.iter().filter(|u| re.is_match(&u.name)).cloned().collect()
            }
            UserFilter::AgeAtLeast(min) => users.iter().filter(|u| u.age >= min).cloned().collect(),
            UserFilter::AgeGreaterThan(min) => users
                .iter()
                .filter(|u| i64::from(u.age) > min)
                .cloned()
                .collect(),
            UserFilter::Active => users.iter().filter(|u| u.is_active).cloned().collect(),
        };
        Ok(matched)
    }

    async fn emails(&self) -> Result<Vec<String>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().map(|u| u.email.clone()).collect())
    }

    async fn update(&self, oid: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(pos) = users.iter().position(|u| u.oid == oid) else {
            return Ok(None);
        };
        let mut updated = users[pos].clone();
        changes.apply_to(&mut updated);
        if let Some(field) = conflicting_field(&users, &updated, Some(oid)) {
            return Err(StoreError::Duplicate { field });
        }
        users[pos] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, oid: Uuid) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let removed = users
            .iter()
            .position(|u| u.oid == oid)
            .map(|pos| users.remove(pos));
        Ok(removed)
    }
}
