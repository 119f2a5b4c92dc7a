//! User Repository
//!
//! Loads and saves the User aggregate. A save writes the current-state row
//! and appends the pending events in one transaction; on failure the whole
//! transaction rolls back and a retry reattempts the same append, which the
//! (aggregate_id, version) uniqueness invariant keeps safe.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Aggregate, User};
use crate::bus::EventBus;
use crate::domain::{EventMetadata, UserEvent, UserStatus};
use crate::event_store::{EventRecord, EventStore, EventStoreError, StoredEvent};

type UserRow = (
    Uuid,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<DateTime<Utc>>,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, \
                            status, deleted_at, version, created_at, updated_at";

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Aggregate not found
    #[error("User not found: {0}")]
    NotFound(Uuid),

    /// Persisted state row could not be interpreted
    #[error("Invalid persisted state for user {user_id}: {detail}")]
    InvalidState { user_id: Uuid, detail: String },

    /// Another live user already owns this email
    #[error("Email already in use: {0}")]
    DuplicateEmail(String),

    /// Event store error (including concurrency conflicts)
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// True when a reload-and-retry may resolve the failure
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, RepositoryError::EventStore(e) if e.is_concurrency_conflict())
    }
}

/// Repository for the User aggregate
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
    event_store: EventStore,
    bus: EventBus,
}

impl UserRepository {
    /// Create a new repository
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            pool,
            bus,
        }
    }

    /// Access the underlying event store
    pub fn event_store(&self) -> &EventStore {
        &self.event_store
    }

    /// Persist the aggregate state and its pending events atomically.
    ///
    /// Consumes the pending events; they are committed exactly when this
    /// returns Ok. The aggregate has already applied its pending events,
    /// so they are appended at the versions its counter accounts for; a
    /// writer working from stale state collides with an existing
    /// (aggregate_id, version) row and gets a `ConcurrencyConflict`, then
    /// reloads and retries. Committed events are published on the
    /// in-process bus afterwards.
    pub async fn save(
        &self,
        user: &User,
        pending_events: Vec<UserEvent>,
        metadata: &EventMetadata,
    ) -> Result<Vec<StoredEvent>, RepositoryError> {
        if pending_events.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(pending_events.len());
        for event in &pending_events {
            records.push(EventRecord::new(event.event_type(), event)?);
        }

        let mut tx = self.pool.begin().await?;

        // (a) upsert the current-state row
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, phone,
                status, deleted_at, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                phone = EXCLUDED.phone,
                status = EXCLUDED.status,
                deleted_at = EXCLUDED.deleted_at,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.id())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.phone())
        .bind(user.status().as_str())
        .bind(user.deleted_at())
        .bind(user.version())
        .bind(user.created_at().unwrap_or_else(Utc::now))
        .bind(user.updated_at().unwrap_or_else(Utc::now))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_email_violation(e, user.email()))?;

        // (b) + (c) append the pending events at the versions the
        // aggregate's counter accounts for
        let start_version = user.version() - records.len() as i64 + 1;

        let stored = self
            .event_store
            .append_batch_in_tx(
                &mut tx,
                user.id(),
                User::aggregate_type(),
                &records,
                start_version,
                metadata,
            )
            .await?;

        tx.commit().await?;

        // (d) best-effort fast-path trigger; catch-up repairs missed delivery
        for event in &stored {
            self.bus.publish(event);
        }

        Ok(stored)
    }

    /// Load a user from its current-state row (fast path)
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(hydrate_row).transpose()
    }

    /// Load a non-deleted user by email (fast path)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(hydrate_row).transpose()
    }

    /// Check whether an email is in use by a non-deleted user
    pub async fn email_taken(&self, email: &str) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND deleted_at IS NULL)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    /// Rebuild a user by folding its full event history (debug/recovery path)
    pub async fn find_by_id_from_events(
        &self,
        user_id: Uuid,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self.event_store.load_aggregate::<User>(user_id).await?)
    }
}

/// Two registrations can race past the email precheck; the loser hits
/// the partial unique index on live emails and must surface as a
/// conflict, not a bare database error.
fn map_email_violation(e: sqlx::Error, email: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505")
            && db_err.constraint() == Some("idx_users_email_active")
        {
            return RepositoryError::DuplicateEmail(email.to_string());
        }
    }
    RepositoryError::Database(e)
}

fn hydrate_row(row: UserRow) -> Result<User, RepositoryError> {
    let (
        id,
        email,
        password_hash,
        first_name,
        last_name,
        phone,
        status,
        deleted_at,
        version,
        created_at,
        updated_at,
    ) = row;

    let status = UserStatus::parse(&status).ok_or_else(|| RepositoryError::InvalidState {
        user_id: id,
        detail: format!("unknown status '{status}'"),
    })?;

    Ok(User::hydrate(
        id,
        email,
        password_hash,
        first_name,
        last_name,
        phone,
        status,
        deleted_at,
        version,
        created_at,
        updated_at,
    ))
}
