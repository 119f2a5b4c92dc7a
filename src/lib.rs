//! user_registry Library
//!
//! Re-exports modules for integration testing and external use.

pub mod aggregate;
pub mod api;
pub mod bus;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod event_store;
pub mod handlers;
pub mod projection;
pub mod repository;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{DomainError, EventMetadata, ProfileChanges, UserEvent, UserStatus};
