//! Unified error handling
//!
//! Application-level error type for HTTP handlers, with the JSON response
//! shape `{ "code": "...", "message": "..." }`.
//!
//! # Error codes
//!
//! | Code | Status | Meaning |
//! |------|--------|---------|
//! | E0001 | 500 | Storage error |
//! | E0002 | 400 | Validation failed |
//! | E0003 | 404 | Resource not found |
//! | E0004 | 409 | Conflicting state transition |
//! | E0000 | 500 | Internal error |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::printing::{JobStoreError, PrintServiceError};

/// Error body returned to API clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Application error enum
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "E0003"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "E0004"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "E0002"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "E0001"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "E0000"),
        };

        if status.is_server_error() {
            error!(code, error = %self, "Request failed");
        }

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PrintServiceError> for AppError {
    fn from(err: PrintServiceError) -> Self {
        match err {
            PrintServiceError::Validation(e) => AppError::Validation(e.to_string()),
            PrintServiceError::JobNotFound(id) => {
                AppError::NotFound(format!("Print job {}", id))
            }
            PrintServiceError::Storage(e) => AppError::from(e),
        }
    }
}

impl From<JobStoreError> for AppError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::JobNotFound(id) => AppError::NotFound(format!("Print job {}", id)),
            JobStoreError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}
