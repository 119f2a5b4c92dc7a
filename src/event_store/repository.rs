//! Event Store Repository
//!
//! Core implementation of the Event Store pattern: an append-only,
//! versioned log of domain events keyed by aggregate. The unique index on
//! (aggregate_id, version) is the optimistic-concurrency primitive; the
//! `global_seq` column provides the storage-order cursor the projection
//! sync engine follows.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::EventMetadata;

use super::EventStoreError;

/// Page size for stream_all scans
const STREAM_BATCH_SIZE: i64 = 100;

/// Stored event row from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEvent {
    pub id: Uuid,
    /// Global storage-order sequence, distinct from the per-aggregate version
    pub global_seq: i64,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub version: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A serialized event ready to be appended
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl EventRecord {
    /// Create a record from any serializable domain event
    pub fn new<E: Serialize>(event_type: &str, event: &E) -> Result<Self, EventStoreError> {
        let event_data = serde_json::to_value(event)?;
        Ok(Self {
            event_type: event_type.to_string(),
            event_data,
            occurred_at: Utc::now(),
        })
    }

    /// Override the occurred-at timestamp (defaults to creation time)
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Filter for querying the event log
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub aggregate_id: Option<Uuid>,
    pub aggregate_type: Option<String>,
    pub event_type: Option<String>,
    pub from_version: Option<i64>,
    pub to_version: Option<i64>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    /// Only events strictly after this global sequence number
    pub after_global_seq: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EventFilter {
    pub fn for_aggregate(aggregate_id: Uuid) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    pub fn after_global_seq(mut self, global_seq: i64) -> Self {
        self.after_global_seq = Some(global_seq);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Event Store for persisting and retrieving events
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Create a new EventStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a single event at `expected_version`
    ///
    /// Fails with `ConcurrencyConflict` when (aggregate_id, expected_version)
    /// already exists. Callers pass `latest_version + 1` and, on conflict,
    /// reload the aggregate and retry.
    pub async fn append(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        record: EventRecord,
        expected_version: i64,
        metadata: &EventMetadata,
    ) -> Result<StoredEvent, EventStoreError> {
        let mut tx = self.pool.begin().await?;
        let stored = self
            .insert_event(&mut tx, aggregate_id, aggregate_type, &record, expected_version, metadata)
            .await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Append a batch of events atomically at versions
    /// `start_version .. start_version + N - 1`
    pub async fn append_batch(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        records: &[EventRecord],
        start_version: i64,
        metadata: &EventMetadata,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut tx = self.pool.begin().await?;
        let stored = self
            .append_batch_in_tx(&mut tx, aggregate_id, aggregate_type, records, start_version, metadata)
            .await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Batch append inside a caller-owned transaction
    ///
    /// Used by the aggregate repository so state-row upsert and event
    /// append commit or roll back together.
    pub async fn append_batch_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
        aggregate_type: &str,
        records: &[EventRecord],
        start_version: i64,
        metadata: &EventMetadata,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut stored = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            let version = start_version + idx as i64;
            let event = self
                .insert_event(tx, aggregate_id, aggregate_type, record, version, metadata)
                .await?;
            stored.push(event);
        }

        Ok(stored)
    }

    async fn insert_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
        aggregate_type: &str,
        record: &EventRecord,
        version: i64,
        metadata: &EventMetadata,
    ) -> Result<StoredEvent, EventStoreError> {
        let metadata_json = serde_json::to_value(metadata)?;

        let stored: StoredEvent = sqlx::query_as(
            r#"
            INSERT INTO events (
                aggregate_type, aggregate_id, version,
                event_type, event_data, metadata, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, global_seq, aggregate_type, aggregate_id, version,
                      event_type, event_data, metadata, occurred_at, created_at
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(version)
        .bind(&record.event_type)
        .bind(&record.event_data)
        .bind(&metadata_json)
        .bind(record.occurred_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_unique_violation(e, aggregate_id, version))?;

        Ok(stored)
    }

    /// All events for an aggregate ascending by version, optionally bounded
    pub async fn events_for_aggregate(
        &self,
        aggregate_id: Uuid,
        from_version: Option<i64>,
        to_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events: Vec<StoredEvent> = sqlx::query_as(
            r#"
            SELECT id, global_seq, aggregate_type, aggregate_id, version,
                   event_type, event_data, metadata, occurred_at, created_at
            FROM events
            WHERE aggregate_id = $1
              AND ($2::bigint IS NULL OR version >= $2)
              AND ($3::bigint IS NULL OR version <= $3)
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(from_version)
        .bind(to_version)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Query the event log, ordered by storage order (`global_seq` ascending)
    pub async fn query(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, global_seq, aggregate_type, aggregate_id, version, \
             event_type, event_data, metadata, occurred_at, created_at \
             FROM events WHERE 1 = 1",
        );

        if let Some(aggregate_id) = filter.aggregate_id {
            qb.push(" AND aggregate_id = ").push_bind(aggregate_id);
        }
        if let Some(ref aggregate_type) = filter.aggregate_type {
            qb.push(" AND aggregate_type = ").push_bind(aggregate_type);
        }
        if let Some(ref event_type) = filter.event_type {
            qb.push(" AND event_type = ").push_bind(event_type);
        }
        if let Some(from_version) = filter.from_version {
            qb.push(" AND version >= ").push_bind(from_version);
        }
        if let Some(to_version) = filter.to_version {
            qb.push(" AND version <= ").push_bind(to_version);
        }
        if let Some(occurred_after) = filter.occurred_after {
            qb.push(" AND occurred_at >= ").push_bind(occurred_after);
        }
        if let Some(occurred_before) = filter.occurred_before {
            qb.push(" AND occurred_at <= ").push_bind(occurred_before);
        }
        if let Some(after_global_seq) = filter.after_global_seq {
            qb.push(" AND global_seq > ").push_bind(after_global_seq);
        }

        qb.push(" ORDER BY global_seq ASC");

        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset);
        }

        let events = qb
            .build_query_as::<StoredEvent>()
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    /// Latest version for an aggregate, 0 when it has no events
    pub async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();

        Ok(version.unwrap_or(0))
    }

    /// Stream every matching event through `callback` in fixed-size batches.
    ///
    /// Delivery is at-least-once: a callback failure halts the stream and
    /// the caller may re-run it, so callback effects must be idempotent or
    /// transactional. Returns the number of events delivered.
    pub async fn stream_all<F, Fut>(
        &self,
        filter: &EventFilter,
        mut callback: F,
    ) -> Result<u64, EventStoreError>
    where
        F: FnMut(StoredEvent) -> Fut,
        Fut: Future<Output = Result<(), EventStoreError>>,
    {
        let mut cursor = filter.after_global_seq.unwrap_or(0);
        let mut delivered = 0u64;

        loop {
            let mut batch_filter = filter.clone();
            batch_filter.after_global_seq = Some(cursor);
            batch_filter.limit = Some(STREAM_BATCH_SIZE);
            batch_filter.offset = None;

            let batch = self.query(&batch_filter).await?;
            let batch_len = batch.len() as i64;
            if batch_len == 0 {
                return Ok(delivered);
            }

            for event in batch {
                let global_seq = event.global_seq;
                callback(event).await.map_err(|e| match e {
                    EventStoreError::CallbackFailed { .. } => e,
                    other => EventStoreError::CallbackFailed {
                        global_seq,
                        message: other.to_string(),
                    },
                })?;
                cursor = global_seq;
                delivered += 1;
            }

            if batch_len < STREAM_BATCH_SIZE {
                return Ok(delivered);
            }
        }
    }

    /// Load an aggregate by folding its full event history.
    ///
    /// Debug/recovery path; normal reads go through the current-state row.
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<Option<A>, EventStoreError>
    where
        A: Aggregate,
        A::Event: serde::de::DeserializeOwned,
    {
        let events = self.events_for_aggregate(aggregate_id, None, None).await?;

        if events.is_empty() {
            return Ok(None);
        }

        let mut aggregate = A::default();
        for stored in events {
            let event: A::Event = serde_json::from_value(stored.event_data)?;
            aggregate = aggregate.apply(event);
        }

        Ok(Some(aggregate))
    }
}

/// Map a unique-constraint violation on (aggregate_id, version) to a
/// concurrency conflict; everything else stays a database error.
fn map_unique_violation(e: sqlx::Error, aggregate_id: Uuid, version: i64) -> EventStoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return EventStoreError::ConcurrencyConflict {
                aggregate_id,
                version,
            };
        }
    }
    EventStoreError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserEvent;

    #[test]
    fn test_event_record_new() {
        let event = UserEvent::UserDeleted {
            user_id: Uuid::new_v4(),
            deleted_at: Utc::now(),
        };

        let record = EventRecord::new(event.event_type(), &event).unwrap();

        assert_eq!(record.event_type, "UserDeleted");
        assert_eq!(record.event_data["type"], "UserDeleted");
    }

    #[test]
    fn test_event_filter_builders() {
        let aggregate_id = Uuid::new_v4();
        let filter = EventFilter::for_aggregate(aggregate_id)
            .after_global_seq(42)
            .with_limit(10);

        assert_eq!(filter.aggregate_id, Some(aggregate_id));
        assert_eq!(filter.after_global_seq, Some(42));
        assert_eq!(filter.limit, Some(10));
        assert!(filter.event_type.is_none());
    }

    #[test]
    fn test_error_classification() {
        let conflict = EventStoreError::ConcurrencyConflict {
            aggregate_id: Uuid::new_v4(),
            version: 2,
        };
        assert!(conflict.is_concurrency_conflict());
        assert!(conflict.is_retryable());

        let stalled = EventStoreError::CallbackFailed {
            global_seq: 7,
            message: "boom".to_string(),
        };
        assert!(!stalled.is_retryable());
        assert!(!stalled.is_concurrency_conflict());
    }
}
