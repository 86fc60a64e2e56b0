use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreateUserRequest, DeletedUserResponse, SearchQuery, UpdateUserRequest};
use super::repo_types::User;
use super::services;
use crate::{error::AppError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/search", get(search_users))
        .route("/users/adults", get(list_adults))
        .route("/users/emails", get(list_emails))
        .route("/users/active", get(list_active))
        .route("/users/age/:min", get(list_older_than))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::ValidationFailed(rejection.body_text())
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = services::list_users(state.store.as_ref()).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = services::get_user(state.store.as_ref(), &id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, [(HeaderName, String); 1], Json<User>), AppError> {
    let Json(body) = payload.map_err(bad_body)?;
    let user = services::create_user(state.store.as_ref(), body).await?;
    let location = format!("/users/{}", user.oid);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(body) = payload.map_err(bad_body)?;
    let user = services::update_user(state.store.as_ref(), &id, body).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedUserResponse>, AppError> {
    let user = services::delete_user(state.store.as_ref(), &id).await?;
    Ok(Json(DeletedUserResponse {
        message: "User deleted",
        user,
    }))
}

/// GET /users/search?name=rah
#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = services::search_users(state.store.as_ref(), q.name).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn list_adults(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = services::list_adults(state.store.as_ref()).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn list_emails(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let emails = services::list_emails(state.store.as_ref()).await?;
    Ok(Json(emails))
}

#[instrument(skip(state))]
pub async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = services::list_active(state.store.as_ref()).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn list_older_than(
    State(state): State<AppState>,
    Path(min): Path<String>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = services::list_older_than(state.store.as_ref(), &min).await?;
    Ok(Json(users))
}
