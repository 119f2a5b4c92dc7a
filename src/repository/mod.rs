//! Aggregate repository module
//!
//! Transactional persistence for aggregates: current-state row plus
//! event-batch append in a single transaction.

mod user_repository;

pub use user_repository::{RepositoryError, UserRepository};
