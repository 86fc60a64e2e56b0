use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::users::repo::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed path or query parameter, caught before the store is touched.
    #[error("{0}")]
    InvalidInput(String),
    /// Missing, mistyped or duplicate field on a write.
    #[error("{0}")]
    ValidationFailed(String),
    #[error("{0}")]
    NotFound(String),
    #[error("store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate { field } => {
                AppError::ValidationFailed(format!("duplicate key: {field} already exists"))
            }
            StoreError::Backend(err) => AppError::StoreUnavailable(err),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::StoreUnavailable(err) => {
                tracing::error!(error = %err, status = status.as_u16(), "request failed");
                "Server error".to_string()
            }
            other => {
                tracing::warn!(error = %other, status = status.as_u16(), "request failed");
                other.to_string()
            }
        };
        (status, Json(ErrorBody { error: &message })).into_response()
    }
}
