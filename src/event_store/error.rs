//! Event Store Errors
//!
//! Error types for event store operations.

use uuid::Uuid;

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict: (aggregate_id, version) already taken.
    /// Callers must reload the latest version and retry.
    #[error("Concurrency conflict for aggregate {aggregate_id}: version {version} already exists")]
    ConcurrencyConflict { aggregate_id: Uuid, version: i64 },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stream_all callback failed; the stream was halted
    #[error("Stream callback failed at global_seq {global_seq}: {message}")]
    CallbackFailed { global_seq: i64, message: String },
}

impl EventStoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }

    /// Check if this error is retryable (after reloading state)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventStoreError::ConcurrencyConflict { .. } | EventStoreError::Database(_)
        )
    }
}
