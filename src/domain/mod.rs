//! Domain module
//!
//! Core domain types and business logic.

pub mod error;
pub mod events;
pub mod metadata;
pub mod status;

pub use error::DomainError;
pub use events::{ProfileChanges, UserEvent};
pub use metadata::EventMetadata;
pub use status::UserStatus;
