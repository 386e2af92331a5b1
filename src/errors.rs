use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use tracing::error;

use crate::dto::FormErrors;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
    #[error("Not found")]
    NotFound,
    #[error("Forbidden")]
    Forbidden,
    #[error("Form validation failed")]
    Validation(FormErrors),
    #[error("Already exists: {0}")]
    Duplicate(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Failures outside the database, such as signing tokens, sending mail or writing files
    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl ApiError {
    /// Maps a repository error, recognising unique-index violations
    pub fn from_db(err: anyhow::Error) -> Self {
        if let Some(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) =
            err.downcast_ref::<DieselError>()
        {
            return ApiError::Duplicate(info.message().to_string());
        }
        ApiError::Database(err)
    }

    /// A single-field validation failure
    pub fn invalid(field: &str, message: &str) -> Self {
        let mut errors = FormErrors::default();
        errors.add(field, message);
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Database(err) => {
                error!("Database error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({ "error": "Internal server error" }))
            }
            ApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({ "error": "Internal server error" }))
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, serde_json::json!({ "error": "Not found" })),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, serde_json::json!({ "error": "Forbidden" })),
            ApiError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({ "error": "Form validation failed", "fields": fields }),
            ),
            ApiError::Duplicate(msg) => (StatusCode::CONFLICT, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}
