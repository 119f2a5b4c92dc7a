//! API module
//!
//! Operational HTTP endpoints.

pub mod routes;

pub use routes::{create_router, AppState};
