use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hash error")]
    PasswordHash,

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid input: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0}")]
    Overlap(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl AppError {
    /// Validation error with a field-level message
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    /// Validation error without a specific field
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::Validation {
            field: None,
            message: message.into(),
        }
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
///
/// All responses use the uniform envelope `{"success": false, "error": {...}}`.
/// Internal errors are logged and surface only a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".to_string(),
                )
            }
            AppError::Migration(ref e) => {
                tracing::error!("Migration error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".to_string(),
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("I/O error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".to_string(),
                )
            }
            AppError::PasswordHash => {
                tracing::error!("Password hashing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".to_string(),
                )
            }
            AppError::Token(ref e) => {
                tracing::debug!("Token rejected: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    None,
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Validation { field, message } => (StatusCode::BAD_REQUEST, field, message),
            AppError::Conflict(what) => (
                StatusCode::CONFLICT,
                Some(what.clone()),
                format!("{} already exists", what),
            ),
            AppError::Overlap(message) => (StatusCode::CONFLICT, None, message.to_string()),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                None,
                "Invalid username or password".to_string(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                None,
                "Authentication required".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                None,
                "You do not have permission to perform this action".to_string(),
            ),
            AppError::NotFound(what) => {
                (StatusCode::NOT_FOUND, None, format!("{} not found", what))
            }
        };

        let error = match field {
            Some(field) => json!({ "message": message, "field": field }),
            None => json!({ "message": message }),
        };

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
