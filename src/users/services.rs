use std::num::IntErrorKind;

use tracing::{debug, info};
use uuid::Uuid;

use super::dto::{CreateUserRequest, UpdateUserRequest};
use super::repo::UserStore;
use super::repo_types::{NewUser, User, UserChanges, UserFilter};
use crate::error::AppError;

pub const ADULT_AGE: i32 = 18;

const USER_NOT_FOUND: &str = "User not found";

/// Parses a path identifier into the store's record identity.
pub fn parse_oid(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidInput("Invalid ID".into()))
}

/// Integers beyond `i64` saturate, so an oversized bound still filters as expected.
pub fn parse_min_age(raw: &str) -> Result<i64, AppError> {
    match raw.trim().parse::<i64>() {
        Ok(min) => Ok(min),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(AppError::InvalidInput("Age must be a number".into())),
        },
    }
}

fn require_text(field: &str, value: String) -> Result<String, AppError> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationFailed(format!("{field} must not be empty")));
    }
    Ok(value)
}

pub fn validate_new_user(req: CreateUserRequest) -> Result<NewUser, AppError> {
    let mut missing = Vec::new();
    if req.id.is_none() {
        missing.push("id");
    }
    if req.name.is_none() {
        missing.push("name");
    }
    if req.age.is_none() {
        missing.push("age");
    }
    if req.email.is_none() {
        missing.push("email");
    }

    match (req.id, req.name, req.age, req.email) {
        (Some(id), Some(name), Some(age), Some(email)) => Ok(NewUser {
            id,
            name: require_text("name", name)?,
            age,
            email: require_text("email", email)?,
            is_active: req.is_active.unwrap_or(true),
        }),
        _ => Err(AppError::ValidationFailed(format!(
            "missing required field(s): {}",
            missing.join(", ")
        ))),
    }
}

fn not_null<T>(field: &str, value: Option<Option<T>>) -> Result<Option<T>, AppError> {
    match value {
        None => Ok(None),
        Some(Some(v)) => Ok(Some(v)),
        Some(None) => Err(AppError::ValidationFailed(format!("{field} cannot be null"))),
    }
}

/// Validates every field the update touches. Clearing a field is not allowed.
pub fn validate_changes(req: UpdateUserRequest) -> Result<UserChanges, AppError> {
    Ok(UserChanges {
        id: not_null("id", req.id)?,
        name: not_null("name", req.name)?
            .map(|v| require_text("name", v))
            .transpose()?,
        age: not_null("age", req.age)?,
        email: not_null("email", req.email)?
            .map(|v| require_text("email", v))
            .transpose()?,
        is_active: not_null("isActive", req.is_active)?,
    })
}

pub fn search_text(name: Option<String>) -> Result<String, AppError> {
    name.filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Name query param is required".into()))
}

pub async fn list_users(store: &dyn UserStore) -> Result<Vec<User>, AppError> {
    Ok(store.find(UserFilter::All).await?)
}

pub async fn get_user(store: &dyn UserStore, raw_id: &str) -> Result<User, AppError> {
    let oid = parse_oid(raw_id)?;
    store
        .find_by_oid(oid)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))
}

pub async fn create_user(store: &dyn UserStore, req: CreateUserRequest) -> Result<User, AppError> {
    let new_user = validate_new_user(req)?;
    let user = store.insert(new_user).await?;
    info!(oid = %user.oid, id = user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn update_user(
    store: &dyn UserStore,
    raw_id: &str,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let oid = parse_oid(raw_id)?;
    let changes = validate_changes(req)?;
    let user = store
        .update(oid, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
    info!(oid = %user.oid, "user updated");
    Ok(user)
}

pub async fn delete_user(store: &dyn UserStore, raw_id: &str) -> Result<User, AppError> {
    let oid = parse_oid(raw_id)?;
    let user = store
        .delete(oid)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
    info!(oid = %user.oid, "user deleted");
    Ok(user)
}

pub async fn search_users(store: &dyn UserStore, name: Option<String>) -> Result<Vec<User>, AppError> {
    let text = search_text(name)?;
    debug!(%text, "searching users by name");
    Ok(store.find(UserFilter::NameContains(text)).await?)
}

pub async fn list_adults(store: &dyn UserStore) -> Result<Vec<User>, AppError> {
    Ok(store.find(UserFilter::AgeAtLeast(ADULT_AGE)).await?)
}

pub async fn list_emails(store: &dyn UserStore) -> Result<Vec<String>, AppError> {
    Ok(store.emails().await?)
}

pub async fn list_active(store: &dyn UserStore) -> Result<Vec<User>, AppError> {
    Ok(store.find(UserFilter::Active).await?)
}

pub async fn list_older_than(store: &dyn UserStore, raw_min: &str) -> Result<Vec<User>, AppError> {
    let min = parse_min_age(raw_min)?;
    Ok(store.find(UserFilter::AgeGreaterThan(min)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::memory::MemoryUserStore;

    fn create_req(id: i64, name: &str, age: i32, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            id: Some(id),
            name: Some(name.into()),
            age: Some(age),
            email: Some(email.into()),
            is_active: None,
        }
    }

    async fn seeded() -> MemoryUserStore {
        let store = MemoryUserStore::new();
        create_user(&store, create_req(1, "Rahul", 17, "r@x.com")).await.unwrap();
        create_user(&store, create_req(2, "Sam", 18, "s@x.com")).await.unwrap();
        store
    }

    fn names(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn create_lists_every_missing_field() {
        let err = validate_new_user(CreateUserRequest {
            name: Some("Sam".into()),
            ..Default::default()
        })
        .unwrap_err();
        match err {
            AppError::ValidationFailed(msg) => {
                assert_eq!(msg, "missing required field(s): id, age, email")
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_blank_text_and_defaults_active() {
        assert!(matches!(
            validate_new_user(create_req(1, "  ", 20, "a@x.com")),
            Err(AppError::ValidationFailed(_))
        ));
        let user = validate_new_user(create_req(1, "Ann", 20, "a@x.com")).unwrap();
        assert!(user.is_active);
    }

    #[test]
    fn update_rejects_null_and_blank_values() {
        let null_age = UpdateUserRequest {
            age: Some(None),
            ..Default::default()
        };
        assert!(matches!(validate_changes(null_age), Err(AppError::ValidationFailed(_))));

        let blank_email = UpdateUserRequest {
            email: Some(Some(String::new())),
            ..Default::default()
        };
        assert!(matches!(validate_changes(blank_email), Err(AppError::ValidationFailed(_))));

        let changes = validate_changes(UpdateUserRequest {
            is_active: Some(Some(false)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(changes.is_active, Some(false));
        assert!(changes.name.is_none());
    }

    #[test]
    fn parameters_are_checked_before_the_store() {
        assert!(matches!(parse_oid("not-a-uuid"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_min_age("abc"), Err(AppError::InvalidInput(_))));
        assert_eq!(parse_min_age("17").unwrap(), 17);
        assert!(matches!(search_text(None), Err(AppError::InvalidInput(_))));
        assert!(matches!(search_text(Some(String::new())), Err(AppError::InvalidInput(_))));
        assert_eq!(search_text(Some("(".into())).unwrap(), "(");
    }

    #[test]
    fn oversized_min_age_saturates() {
        assert_eq!(parse_min_age("99999999999999999999").unwrap(), i64::MAX);
        assert_eq!(parse_min_age("-99999999999999999999").unwrap(), i64::MIN);
        assert!(matches!(parse_min_age("17abc"), Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn oversized_min_age_matches_nobody() {
        let store = seeded().await;
        let users = list_older_than(&store, "99999999999999999999").await.unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn search_text_is_matched_literally() {
        let store = seeded().await;
        for text in [r"\p{L}ahul", r"rah\z", "(?P<n>rah)", "r.h"] {
            let found = search_users(&store, Some(text.into())).await.unwrap();
            assert!(found.is_empty(), "{text} should match nothing");
        }
        assert_eq!(names(&search_users(&store, Some("AHU".into())).await.unwrap()), ["Rahul"]);
    }

    #[tokio::test]
    async fn created_user_is_retrievable_by_identity_and_email() {
        let store = MemoryUserStore::new();
        let created = create_user(&store, create_req(7, "Ann", 40, "a@x.com")).await.unwrap();

        let fetched = get_user(&store, &created.oid.to_string()).await.unwrap();
        assert_eq!(fetched, created);
        assert!(list_emails(&store).await.unwrap().contains(&"a@x.com".to_string()));
    }

    #[tokio::test]
    async fn duplicate_create_fails_and_leaves_store_unchanged() {
        let store = seeded().await;
        let before = list_users(&store).await.unwrap();

        let dup_email = create_user(&store, create_req(3, "Other", 30, "s@x.com")).await;
        assert!(matches!(dup_email, Err(AppError::ValidationFailed(_))));
        let dup_id = create_user(&store, create_req(2, "Other", 30, "o@x.com")).await;
        assert!(matches!(dup_id, Err(AppError::ValidationFailed(_))));

        assert_eq!(list_users(&store).await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_merges_only_supplied_fields() {
        let store = seeded().await;
        let rahul = list_users(&store).await.unwrap().remove(0);

        let updated = update_user(
            &store,
            &rahul.oid.to_string(),
            UpdateUserRequest {
                age: Some(Some(21)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.age, 21);
        assert_eq!(updated.name, "Rahul");
        assert_eq!(updated.email, "r@x.com");
    }

    #[tokio::test]
    async fn update_of_unknown_record_is_not_found_and_mutates_nothing() {
        let store = seeded().await;
        let before = list_users(&store).await.unwrap();

        let err = update_user(
            &store,
            &Uuid::new_v4().to_string(),
            UpdateUserRequest {
                name: Some(Some("Ghost".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(list_users(&store).await.unwrap(), before);
    }

    #[tokio::test]
    async fn deleted_user_is_gone() {
        let store = seeded().await;
        let sam = list_users(&store).await.unwrap().remove(1);
        let oid = sam.oid.to_string();

        assert_eq!(delete_user(&store, &oid).await.unwrap(), sam);
        assert!(matches!(get_user(&store, &oid).await, Err(AppError::NotFound(_))));
        assert!(matches!(delete_user(&store, &oid).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn adult_bound_is_inclusive_and_min_age_bound_is_strict() {
        let store = seeded().await;
        assert_eq!(names(&list_adults(&store).await.unwrap()), ["Sam"]);
        assert_eq!(names(&list_older_than(&store, "17").await.unwrap()), ["Sam"]);
        assert_eq!(names(&list_older_than(&store, "16").await.unwrap()), ["Rahul", "Sam"]);
        assert!(list_older_than(&store, "18").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = seeded().await;
        let found = search_users(&store, Some("rah".into())).await.unwrap();
        assert_eq!(names(&found), ["Rahul"]);
        assert!(matches!(search_users(&store, None).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn active_filter_skips_inactive_users() {
        let store = seeded().await;
        let sam = list_users(&store).await.unwrap().remove(1);
        update_user(
            &store,
            &sam.oid.to_string(),
            UpdateUserRequest {
                is_active: Some(Some(false)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(names(&list_active(&store).await.unwrap()), ["Rahul"]);
    }
}
