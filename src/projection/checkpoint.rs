//! Sync checkpoints
//!
//! One row per projection records the last global sequence number whose
//! event was durably applied. The sync engine resumes from here after a
//! restart, so the checkpoint only ever moves forward except on an
//! explicit rebuild reset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::store::ProjectionError;

/// Checkpoint row for one projection consumer
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SyncCheckpoint {
    pub projection_name: String,
    /// Global sequence of the last event applied
    pub last_global_seq: i64,
    pub total_events_processed: i64,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Store for projection checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    pool: PgPool,
}

impl CheckpointStore {
    /// Create a new CheckpointStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the checkpoint for a projection, if one exists
    pub async fn load(
        &self,
        projection_name: &str,
    ) -> Result<Option<SyncCheckpoint>, ProjectionError> {
        let row: Option<SyncCheckpoint> = sqlx::query_as(
            r#"
            SELECT projection_name, last_global_seq, total_events_processed,
                   error_count, last_error, last_run_at, updated_at
            FROM projection_checkpoints
            WHERE projection_name = $1
            "#,
        )
        .bind(projection_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Advance the checkpoint after one event was durably applied.
    ///
    /// GREATEST keeps the cursor monotonic even if a stale run writes
    /// late; the processed counter still ticks because the event was
    /// delivered once more.
    pub async fn advance(
        &self,
        projection_name: &str,
        global_seq: i64,
    ) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO projection_checkpoints (
                projection_name, last_global_seq, total_events_processed,
                error_count, last_run_at, updated_at
            )
            VALUES ($1, $2, 1, 0, NOW(), NOW())
            ON CONFLICT (projection_name) DO UPDATE SET
                last_global_seq = GREATEST(projection_checkpoints.last_global_seq, EXCLUDED.last_global_seq),
                total_events_processed = projection_checkpoints.total_events_processed + 1,
                last_run_at = NOW(),
                updated_at = NOW()
            "#,
        )
        .bind(projection_name)
        .bind(global_seq)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a failed sync run. The cursor does not move, so the next
    /// run retries the same event.
    pub async fn record_failure(
        &self,
        projection_name: &str,
        message: &str,
    ) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO projection_checkpoints (
                projection_name, last_global_seq, total_events_processed,
                error_count, last_error, last_run_at, updated_at
            )
            VALUES ($1, 0, 0, 1, $2, NOW(), NOW())
            ON CONFLICT (projection_name) DO UPDATE SET
                error_count = projection_checkpoints.error_count + 1,
                last_error = EXCLUDED.last_error,
                last_run_at = NOW(),
                updated_at = NOW()
            "#,
        )
        .bind(projection_name)
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a run that applied nothing, so staleness is observable
    pub async fn touch(&self, projection_name: &str) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            UPDATE projection_checkpoints
            SET last_run_at = NOW(), updated_at = NOW()
            WHERE projection_name = $1
            "#,
        )
        .bind(projection_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reset the checkpoint for a full rebuild: cursor and processed
    /// count back to zero, last error cleared. The error count stays as
    /// a lifetime diagnostic.
    pub async fn reset(&self, projection_name: &str) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO projection_checkpoints (
                projection_name, last_global_seq, total_events_processed,
                error_count, last_error, last_run_at, updated_at
            )
            VALUES ($1, 0, 0, 0, NULL, NOW(), NOW())
            ON CONFLICT (projection_name) DO UPDATE SET
                last_global_seq = 0,
                total_events_processed = 0,
                last_error = NULL,
                last_run_at = NOW(),
                updated_at = NOW()
            "#,
        )
        .bind(projection_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
