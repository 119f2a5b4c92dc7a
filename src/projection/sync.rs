//! Projection Sync Engine
//!
//! Single consumer that folds the global event log into the user
//! projection. It resumes from the persisted checkpoint, applies events
//! in strict global-sequence order, and advances the checkpoint after
//! every durably applied event. Delivery is at-least-once; the
//! projection writes themselves are idempotent, so redelivery is safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::event_store::{EventFilter, EventStore, EventStoreError};

use super::apply::{apply_event, Applied};
use super::checkpoint::{CheckpointStore, SyncCheckpoint};
use super::store::{ProjectionError, ProjectionStore};

/// Checkpoint row name for the user projection consumer
pub const PROJECTION_NAME: &str = "user";

/// Sync engine errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Applying one event failed; the checkpoint stays put so the next
    /// run retries from the same event
    #[error("Failed to apply event at global_seq {global_seq} ({event_type}): {source}")]
    Apply {
        global_seq: i64,
        event_type: String,
        #[source]
        source: ProjectionError,
    },

    /// A rebuild was requested while a sync run was active
    #[error("A sync run is already in progress")]
    SyncInProgress,

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Current sync state, for the ops endpoints
#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub projection_name: String,
    pub syncing: bool,
    pub checkpoint: Option<SyncCheckpoint>,
}

/// Outcome of one catch-up run
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub applied: u64,
    pub skipped: u64,
}

impl SyncReport {
    pub fn processed(&self) -> u64 {
        self.applied + self.skipped
    }
}

/// Single-consumer engine keeping the user projection in sync with the
/// event log
pub struct SyncEngine {
    event_store: EventStore,
    projections: ProjectionStore,
    checkpoints: CheckpointStore,
    batch_size: i64,
    poll_interval: Duration,
    running: AtomicBool,
}

/// Clears the running flag even if a run panics
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    /// Create a sync engine over the given stores
    pub fn new(
        event_store: EventStore,
        projections: ProjectionStore,
        checkpoints: CheckpointStore,
        batch_size: i64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            event_store,
            projections,
            checkpoints,
            batch_size,
            poll_interval,
            running: AtomicBool::new(false),
        }
    }

    /// Startup catch-up. The service must not serve reads from a stale
    /// projection, so a failure here is fatal to startup.
    pub async fn init(&self) -> Result<SyncReport, SyncError> {
        info!("Running startup projection catch-up");
        let report = self.catch_up().await?;
        info!(
            applied = report.applied,
            skipped = report.skipped,
            "Startup catch-up complete"
        );
        Ok(report)
    }

    /// Run one catch-up pass: apply every event past the checkpoint, in
    /// global-sequence order, advancing the checkpoint per event.
    ///
    /// Overlapping runs are skipped, not queued: if a run is already
    /// active this returns an empty report and the active run picks up
    /// whatever this one would have.
    pub async fn catch_up(&self) -> Result<SyncReport, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync run already in progress, skipping");
            return Ok(SyncReport::default());
        }
        let _guard = RunGuard(&self.running);

        self.run_catch_up().await
    }

    /// Rebuild the projection from scratch: truncate every row, reset
    /// the checkpoint, replay the full log. Fails fast when a sync run
    /// is active rather than racing it.
    pub async fn rebuild(&self) -> Result<SyncReport, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SyncInProgress);
        }
        let _guard = RunGuard(&self.running);

        info!("Rebuilding user projection from the event log");
        self.projections.truncate_all().await?;
        self.checkpoints.reset(PROJECTION_NAME).await?;

        let report = self.run_catch_up().await?;
        info!(
            applied = report.applied,
            skipped = report.skipped,
            "Projection rebuild complete"
        );
        Ok(report)
    }

    /// Catch-up body. Caller holds the running flag.
    async fn run_catch_up(&self) -> Result<SyncReport, SyncError> {
        let mut cursor = self
            .checkpoints
            .load(PROJECTION_NAME)
            .await?
            .map(|cp| cp.last_global_seq)
            .unwrap_or(0);

        let mut report = SyncReport::default();

        loop {
            let filter = EventFilter::default()
                .after_global_seq(cursor)
                .with_limit(self.batch_size);
            let batch = self.event_store.query(&filter).await?;

            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len() as i64;

            for event in batch {
                match apply_event(&self.projections, &event).await {
                    Ok(outcome) => {
                        self.checkpoints
                            .advance(PROJECTION_NAME, event.global_seq)
                            .await?;
                        cursor = event.global_seq;
                        match outcome {
                            Applied::Applied => report.applied += 1,
                            Applied::Skipped => report.skipped += 1,
                        }
                    }
                    Err(e) => {
                        let failure = SyncError::Apply {
                            global_seq: event.global_seq,
                            event_type: event.event_type.clone(),
                            source: e,
                        };
                        error!(
                            global_seq = event.global_seq,
                            event_type = %event.event_type,
                            error = %failure,
                            "Aborting sync run"
                        );
                        if let Err(mark) = self
                            .checkpoints
                            .record_failure(PROJECTION_NAME, &failure.to_string())
                            .await
                        {
                            error!(error = %mark, "Failed to record sync failure on checkpoint");
                        }
                        return Err(failure);
                    }
                }
            }

            if batch_len < self.batch_size {
                break;
            }
        }

        if report.processed() == 0 {
            self.checkpoints.touch(PROJECTION_NAME).await?;
        } else {
            debug!(
                applied = report.applied,
                skipped = report.skipped,
                cursor,
                "Sync run applied events"
            );
        }

        Ok(report)
    }

    /// Current checkpoint plus whether a run is active
    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        let checkpoint = self.checkpoints.load(PROJECTION_NAME).await?;
        Ok(SyncStatus {
            projection_name: PROJECTION_NAME.to_string(),
            syncing: self.running.load(Ordering::SeqCst),
            checkpoint,
        })
    }

    /// Spawn the periodic poll loop. Failures are logged and retried on
    /// the next tick; only startup treats a catch-up failure as fatal.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; startup already caught up
            ticker.tick().await;

            info!(interval_secs = interval.as_secs(), "Projection sync loop started");
            loop {
                ticker.tick().await;
                match self.catch_up().await {
                    Ok(report) if report.processed() > 0 => {
                        info!(
                            applied = report.applied,
                            skipped = report.skipped,
                            "Periodic sync applied events"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Periodic sync run failed");
                    }
                }
            }
        })
    }
}
