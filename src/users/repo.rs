use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserChanges, UserFilter};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field (`id` or `email`) already belongs to another record.
    #[error("duplicate {field}")]
    Duplicate { field: &'static str },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Document-store capability the service is written against.
///
/// Implementations must enforce uniqueness of `id` and `email` atomically
/// with the write that would violate it.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_oid(&self, oid: Uuid) -> Result<Option<User>, StoreError>;
    /// Matching records in insertion order.
    async fn find(&self, filter: UserFilter) -> Result<Vec<User>, StoreError>;
    /// Email of every record, insertion order.
    async fn emails(&self) -> Result<Vec<String>, StoreError>;
    /// Returns the updated record, or `None` if `oid` is unknown.
    async fn update(&self, oid: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;
    /// Returns the removed record, or `None` if `oid` is unknown.
    async fn delete(&self, oid: Uuid) -> Result<Option<User>, StoreError>;
}

const USER_COLUMNS: &str = "oid, id, name, age, email, is_active";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Which unique field a constraint name guards.
fn constraint_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(c) if c.contains("email") => "email",
        _ => "id",
    }
}

fn where_clause(filter: &UserFilter) -> &'static str {
    match filter {
        UserFilter::All => "",
        UserFilter::NameContains(_) => r"WHERE name ILIKE '%' || $1 || '%' ESCAPE '\'",
        UserFilter::AgeAtLeast(_) => "WHERE age >= $1",
        UserFilter::AgeGreaterThan(_) => "WHERE age > $1::BIGINT",
        UserFilter::Active => "WHERE is_active",
    }
}

/// Escapes LIKE wildcards so the search text matches literally.
fn like_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_write_err(e: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                field: constraint_field(db_err.constraint()),
            };
        }
    }
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (oid, id, name, age, email, is_active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.id)
            .bind(&user.name)
            .bind(user.age)
            .bind(&user.email)
            .bind(user.is_active)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_err(e, "insert user"))
    }

    async fn find_by_oid(&self, oid: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE oid = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(oid)
            .fetch_optional(&self.db)
            .await
            .context("find user by oid")?;
        Ok(user)
    }

    async fn find(&self, filter: UserFilter) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users {} ORDER BY seq",
            where_clause(&filter)
        );
        let query = sqlx::query_as::<_, User>(&sql);
        let query = match filter {
            UserFilter::NameContains(text) => query.bind(like_escape(&text)),
            UserFilter::AgeAtLeast(min) => query.bind(min),
            UserFilter::AgeGreaterThan(min) => query.bind(min),
            UserFilter::All | UserFilter::Active => query,
        };
        let users = query.fetch_all(&self.db).await.context("find users")?;
        Ok(users)
    }

    async fn emails(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT email FROM users ORDER BY seq")
            .fetch_all(&self.db)
            .await
            .context("list emails")?;
        Ok(rows.into_iter().map(|(email,)| email).collect())
    }

    async fn update(&self, oid: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET
                 id = COALESCE($2, id),
                 name = COALESCE($3, name),
                 age = COALESCE($4, age),
                 email = COALESCE($5, email),
                 is_active = COALESCE($6, is_active)
             WHERE oid = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(oid)
            .bind(changes.id)
            .bind(changes.name)
            .bind(changes.age)
            .bind(changes.email)
            .bind(changes.is_active)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_write_err(e, "update user"))
    }

    async fn delete(&self, oid: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("DELETE FROM users WHERE oid = $1 RETURNING {USER_COLUMNS}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(oid)
            .fetch_optional(&self.db)
            .await
            .context("delete user")?;
        Ok(user)
    }
}
