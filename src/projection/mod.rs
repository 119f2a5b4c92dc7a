//! Projection layer
//!
//! Denormalized read model for users, kept in sync with the event log by
//! a checkpointed single-consumer engine plus a best-effort post-commit
//! fast path.

pub mod apply;
mod checkpoint;
mod store;
mod sync;

pub use apply::{apply_event, Applied};
pub use checkpoint::{CheckpointStore, SyncCheckpoint};
pub use store::{ProjectionError, ProjectionStore, UserProjection};
pub use sync::{SyncEngine, SyncError, SyncReport, SyncStatus, PROJECTION_NAME};
