//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::event_store::EventStoreError;
use crate::projection::{ProjectionError, SyncError};
use crate::repository::RepositoryError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    #[error("Sync already in progress")]
    SyncInProgress,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Event store error: {0}")]
    EventStore(EventStoreError),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Projection error: {0}")]
    Projection(ProjectionError),

    #[error("Sync error: {0}")]
    Sync(SyncError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

// Concurrency conflicts and already-syncing signals are client-visible
// 409s; everything else from those layers is a server error.
impl From<EventStoreError> for AppError {
    fn from(e: EventStoreError) -> Self {
        if e.is_concurrency_conflict() {
            AppError::VersionConflict
        } else {
            AppError::EventStore(e)
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => AppError::UserNotFound(id.to_string()),
            RepositoryError::DuplicateEmail(_) => AppError::EmailTaken,
            e if e.is_concurrency_conflict() => AppError::VersionConflict,
            e => AppError::Repository(e),
        }
    }
}

impl From<ProjectionError> for AppError {
    fn from(e: ProjectionError) -> Self {
        match e {
            ProjectionError::NotFound(id) => AppError::UserNotFound(id.to_string()),
            e => AppError::Projection(e),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::SyncInProgress => AppError::SyncInProgress,
            e => AppError::Sync(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::UserNotFound(id) => {
                (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
            }

            // 409 Conflict
            AppError::EmailTaken => (StatusCode::CONFLICT, "email_taken", None),
            AppError::VersionConflict => (StatusCode::CONFLICT, "version_conflict", None),
            AppError::SyncInProgress => (StatusCode::CONFLICT, "sync_in_progress", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::UserDeleted => {
                        (StatusCode::GONE, "user_deleted", None)
                    }
                    DomainError::AlreadyVerified => {
                        (StatusCode::CONFLICT, "already_verified", None)
                    }
                    DomainError::NoChanges => {
                        (StatusCode::BAD_REQUEST, "no_changes", None)
                    }
                    DomainError::InvalidStatusTransition { from, to } => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "invalid_status_transition",
                        Some(format!("{} -> {}", from, to)),
                    ),
                    DomainError::BusinessRuleViolation(msg) => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "business_rule_violation",
                        Some(msg.clone()),
                    ),
                }
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::EventStore(e) => {
                tracing::error!("Event store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "event_store_error", None)
            }
            AppError::Repository(e) => {
                tracing::error!("Repository error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "repository_error", None)
            }
            AppError::Projection(e) => {
                tracing::error!("Projection error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "projection_error", None)
            }
            AppError::Sync(e) => {
                tracing::error!("Sync error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "sync_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
