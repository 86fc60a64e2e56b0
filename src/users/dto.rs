use serde::{Deserialize, Deserializer, Serialize};

use super::repo_types::User;

/// Body of `POST /users`. Every field is optional at the wire level so a
/// missing one surfaces as a validation error naming it.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    #[serde(rename = "isActive")]
    pub is_active: Option<bool>,
}

/// Body of `PUT /users/:id`.
///
/// Outer `None`: field absent, leave as is. `Some(None)`: explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Option<String>>,
    #[serde(default, rename = "isActive", deserialize_with = "present")]
    pub is_active: Option<Option<bool>>,
}

fn present<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedUserResponse {
    pub message: &'static str,
    pub user: User,
}
