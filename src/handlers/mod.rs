//! Command handlers
//!
//! One handler per command. Each loads the aggregate from its
//! current-state row, asks the aggregate for the resulting event, applies
//! it, and saves state plus event through the repository. A concurrency
//! conflict surfaces as a version-conflict error and the caller retries.

mod commands;
mod lifecycle_handler;
mod login_handler;
mod profile_handler;
mod register_handler;

pub use commands::{
    ChangeStatusCommand, CommandResult, DeleteUserCommand, RecordLoginCommand,
    RegisterUserCommand, RegisterUserResult, UpdateProfileCommand, VerifyEmailCommand,
};
pub use lifecycle_handler::{ChangeStatusHandler, DeleteUserHandler, VerifyEmailHandler};
pub use login_handler::RecordLoginHandler;
pub use profile_handler::UpdateProfileHandler;
pub use register_handler::RegisterUserHandler;
