use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User record as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    #[serde(rename = "_id")]
    pub oid: Uuid, // store-assigned identity
    pub id: i64, // external identifier
    pub name: String,
    pub age: i32,
    pub email: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

/// A validated record ready for insertion. The store assigns `oid`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub email: String,
    pub is_active: bool,
}

/// Validated partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(id) = self.id {
            user.id = id;
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(age) = self.age {
            user.age = age;
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
    }
}

/// Fixed predicates the store knows how to evaluate.
#[derive(Debug, Clone)]
pub enum UserFilter {
    All,
    /// Case-insensitive literal substring of `name`.
    NameContains(String),
    AgeAtLeast(i32),
    AgeGreaterThan(i64),
    Active,
}
