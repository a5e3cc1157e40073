//! Error handling for the Trading Ledger
//!
//! Every core operation returns one of four kinds of failure: validation,
//! not found, conflict, or infrastructure. The HTTP layer maps the kind to a
//! status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::Weight;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Concurrent state violations
    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Insufficient stock on sort {stock_sort_id}: requested {requested}, available {available}")]
    InsufficientStock {
        stock_sort_id: Uuid,
        requested: Weight,
        available: Weight,
    },

    #[error("Fiber already in use: {0}")]
    FiberInUse(Uuid),

    // Infrastructure errors
    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Classification of an [`AppError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Validation,
    NotFound,
    Conflict,
    Infrastructure,
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::TokenExpired | AppError::InvalidToken | AppError::Unauthorized(_) => {
                ErrorKind::Unauthorized
            }
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict { .. }
            | AppError::InsufficientStock { .. }
            | AppError::FiberInUse(_) => ErrorKind::Conflict,
            AppError::StoreUnavailable(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether repeating the same call unchanged may succeed.
    ///
    /// Only store failures qualify: every operation runs in a single
    /// transaction, so a failed attempt leaves nothing behind.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::StoreUnavailable(_) => true,
            AppError::DatabaseError(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ) || is_serialization_failure(err),
            _ => false,
        }
    }
}

/// Postgres serialization_failure / deadlock_detected
fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001") | Some("40P01")),
        _ => false,
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "request".to_string());
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub retryable: bool,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::FiberInUse(_) => "FIBER_IN_USE",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Infrastructure if self.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalError(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        };
        let field = match &self {
            AppError::Validation { field, .. } => Some(field.clone()),
            AppError::Conflict { resource, .. } => Some(resource.clone()),
            _ => None,
        };
        let error_detail = ErrorDetail {
            code: self.code().to_string(),
            message,
            field,
            retryable: self.is_retryable(),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AppError::validation("weight", "Weight must be positive").kind(),
            ErrorKind::Validation
        );
        assert_eq!(AppError::NotFound("Sale".into()).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::FiberInUse(Uuid::nil()).kind(), ErrorKind::Conflict);
        assert_eq!(
            AppError::InsufficientStock {
                stock_sort_id: Uuid::nil(),
                requested: 70,
                available: 60,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::StoreUnavailable("down".into()).kind(),
            ErrorKind::Infrastructure
        );
    }

    #[test]
    fn test_only_store_failures_are_retryable() {
        assert!(AppError::StoreUnavailable("down".into()).is_retryable());
        assert!(AppError::DatabaseError(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::DatabaseError(sqlx::Error::RowNotFound).is_retryable());
        assert!(!AppError::FiberInUse(Uuid::nil()).is_retryable());
        assert!(!AppError::validation("amount", "bad").is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("Fiber".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::conflict("fiber", "fiber already in use")
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::StoreUnavailable("down".into())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Internal("broken".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
