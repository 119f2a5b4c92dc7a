//! User Projection Store
//!
//! Denormalized read-model rows, one per user aggregate. Every write here is
//! idempotent under at-least-once redelivery: inserts ignore conflicts and
//! updates are guarded by the row's last-applied-event watermark, so replays
//! (including counter increments) apply at most once per event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::ProfileChanges;

/// Denormalized user read-model row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProjection {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub phone: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub failed_login_attempts: i32,
    /// Role tags (stub, carried as opaque array)
    pub roles: serde_json::Value,
    /// Permission tags (stub, carried as opaque array)
    pub permissions: serde_json::Value,
    /// Derived completion percentage (0..=100)
    pub profile_completion: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Per-aggregate version of the last event applied to this row
    pub last_applied_event_version: i64,
}

const PROJECTION_COLUMNS: &str = "id, email, display_name, first_name, last_name, status, phone, \
     last_login_at, login_count, failed_login_attempts, roles, permissions, \
     profile_completion, deleted_at, created_at, updated_at, last_applied_event_version";

/// Projection errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Projection not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid payload for {event_type} event: {source}")]
    InvalidPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Store for the user projection table
#[derive(Debug, Clone)]
pub struct ProjectionStore {
    pool: PgPool,
}

impl ProjectionStore {
    /// Create a new ProjectionStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Per-event-type apply functions
    // =========================================================================

    /// UserRegistered: insert the projection row.
    /// Ignore-on-conflict because catch-up may reprocess the event.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_registered(
        &self,
        user_id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
        phone: Option<&str>,
        registered_at: DateTime<Utc>,
        version: i64,
    ) -> Result<bool, ProjectionError> {
        let display_name = format!("{first_name} {last_name}").trim().to_string();
        let profile_completion = completion_pct(email, first_name, last_name, phone);

        let rows = sqlx::query(
            r#"
            INSERT INTO user_projections (
                id, email, display_name, first_name, last_name, status, phone,
                login_count, failed_login_attempts, roles, permissions,
                profile_completion, created_at, updated_at, last_applied_event_version
            )
            VALUES ($1, $2, $3, $4, $5, 'pending_verification', $6,
                    0, 0, '[]'::jsonb, '[]'::jsonb, $7, $8, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(&display_name)
        .bind(first_name)
        .bind(last_name)
        .bind(phone)
        .bind(profile_completion)
        .bind(registered_at)
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// UserLoginSuccess: set last-login, bump the login counter, reset
    /// failed attempts. Watermark-guarded so a replay never double-counts.
    pub async fn apply_login_success(
        &self,
        user_id: Uuid,
        logged_in_at: DateTime<Utc>,
        version: i64,
    ) -> Result<bool, ProjectionError> {
        let rows = sqlx::query(
            r#"
            UPDATE user_projections
            SET last_login_at = $2,
                login_count = login_count + 1,
                failed_login_attempts = 0,
                updated_at = NOW(),
                last_applied_event_version = $3
            WHERE id = $1 AND last_applied_event_version < $3
            "#,
        )
        .bind(user_id)
        .bind(logged_in_at)
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// UserLoginFailed: bump the failed-attempt counter, watermark-guarded
    pub async fn apply_login_failure(
        &self,
        user_id: Uuid,
        version: i64,
    ) -> Result<bool, ProjectionError> {
        let rows = sqlx::query(
            r#"
            UPDATE user_projections
            SET failed_login_attempts = failed_login_attempts + 1,
                updated_at = NOW(),
                last_applied_event_version = $2
            WHERE id = $1 AND last_applied_event_version < $2
            "#,
        )
        .bind(user_id)
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// EmailVerificationSuccess: the user becomes accepted
    pub async fn apply_email_verified(
        &self,
        user_id: Uuid,
        verified_at: DateTime<Utc>,
        version: i64,
    ) -> Result<bool, ProjectionError> {
        let rows = sqlx::query(
            r#"
            UPDATE user_projections
            SET status = 'accepted',
                updated_at = $2,
                last_applied_event_version = $3
            WHERE id = $1 AND last_applied_event_version < $3
            "#,
        )
        .bind(user_id)
        .bind(verified_at)
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// ProfileUpdated: merge only the changed fields; the display name is
    /// recombined from the post-merge name parts and the completion
    /// percentage recomputed, all in one guarded statement.
    pub async fn apply_profile_updated(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
        version: i64,
    ) -> Result<bool, ProjectionError> {
        let rows = sqlx::query(
            r#"
            UPDATE user_projections
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                display_name = TRIM(
                    CONCAT(COALESCE($2, first_name), ' ', COALESCE($3, last_name))
                ),
                profile_completion =
                      (CASE WHEN email <> '' THEN 25 ELSE 0 END)
                    + (CASE WHEN COALESCE($2, first_name) <> '' THEN 25 ELSE 0 END)
                    + (CASE WHEN COALESCE($3, last_name) <> '' THEN 25 ELSE 0 END)
                    + (CASE WHEN COALESCE($4, phone) IS NOT NULL THEN 25 ELSE 0 END),
                updated_at = $5,
                last_applied_event_version = $6
            WHERE id = $1 AND last_applied_event_version < $6
            "#,
        )
        .bind(user_id)
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.phone.as_deref())
        .bind(updated_at)
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// UserStatusChanged: overwrite the status mirror
    pub async fn apply_status_changed(
        &self,
        user_id: Uuid,
        status: &str,
        changed_at: DateTime<Utc>,
        version: i64,
    ) -> Result<bool, ProjectionError> {
        let rows = sqlx::query(
            r#"
            UPDATE user_projections
            SET status = $2,
                updated_at = $3,
                last_applied_event_version = $4
            WHERE id = $1 AND last_applied_event_version < $4
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(changed_at)
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// UserDeleted: soft-delete timestamp plus the terminal blocked status
    pub async fn apply_deleted(
        &self,
        user_id: Uuid,
        deleted_at: DateTime<Utc>,
        version: i64,
    ) -> Result<bool, ProjectionError> {
        let rows = sqlx::query(
            r#"
            UPDATE user_projections
            SET deleted_at = $2,
                status = 'blocked',
                updated_at = $2,
                last_applied_event_version = $3
            WHERE id = $1 AND last_applied_event_version < $3
            "#,
        )
        .bind(user_id)
        .bind(deleted_at)
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get a projection row by user id
    pub async fn get(&self, user_id: Uuid) -> Result<Option<UserProjection>, ProjectionError> {
        let row: Option<UserProjection> = sqlx::query_as(&format!(
            "SELECT {PROJECTION_COLUMNS} FROM user_projections WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Get a projection row by user id, erroring when absent
    pub async fn get_required(&self, user_id: Uuid) -> Result<UserProjection, ProjectionError> {
        self.get(user_id)
            .await?
            .ok_or(ProjectionError::NotFound(user_id))
    }

    /// Get a non-deleted projection row by email
    pub async fn get_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserProjection>, ProjectionError> {
        let row: Option<UserProjection> = sqlx::query_as(&format!(
            "SELECT {PROJECTION_COLUMNS} FROM user_projections \
             WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// List non-deleted projections by status, newest first
    pub async fn find_by_status(
        &self,
        status: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserProjection>, ProjectionError> {
        let rows: Vec<UserProjection> = sqlx::query_as(&format!(
            "SELECT {PROJECTION_COLUMNS} FROM user_projections \
             WHERE status = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Drop every projection row. Only the rebuild path calls this.
    pub async fn truncate_all(&self) -> Result<(), ProjectionError> {
        sqlx::query("TRUNCATE TABLE user_projections")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Completion percentage over the four profile fields, 25% each
fn completion_pct(email: &str, first_name: &str, last_name: &str, phone: Option<&str>) -> i32 {
    let mut pct = 0;
    if !email.is_empty() {
        pct += 25;
    }
    if !first_name.is_empty() {
        pct += 25;
    }
    if !last_name.is_empty() {
        pct += 25;
    }
    if phone.is_some() {
        pct += 25;
    }
    pct
}
