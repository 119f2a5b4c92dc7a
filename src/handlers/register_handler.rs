//! User Registration Handler
//!
//! Creates a new user aggregate and persists its registration event.

use tracing::info;
use uuid::Uuid;

use crate::aggregate::{Aggregate, User};
use crate::domain::EventMetadata;
use crate::error::{AppError, AppResult};
use crate::repository::UserRepository;

use super::{RegisterUserCommand, RegisterUserResult};

/// Handler for user registration
pub struct RegisterUserHandler {
    repository: UserRepository,
}

impl RegisterUserHandler {
    pub fn new(repository: UserRepository) -> Self {
        Self { repository }
    }

    /// Execute the registration command
    pub async fn execute(
        &self,
        command: RegisterUserCommand,
        metadata: &EventMetadata,
    ) -> AppResult<RegisterUserResult> {
        validate(&command)?;

        // Best-effort precheck; the unique email index is the real guard
        if self.repository.email_taken(&command.email).await? {
            return Err(AppError::EmailTaken);
        }

        let (user, event) = User::register(
            Uuid::new_v4(),
            command.email,
            command.password_hash,
            command.first_name,
            command.last_name,
            command.phone,
        );

        self.repository.save(&user, vec![event], metadata).await?;

        info!(user_id = %user.id(), email = %user.email(), "User registered");

        Ok(RegisterUserResult {
            user_id: user.id(),
            email: user.email().to_string(),
            status: user.status().as_str().to_string(),
            version: user.version(),
        })
    }
}

fn validate(command: &RegisterUserCommand) -> AppResult<()> {
    if command.email.trim().is_empty() || !command.email.contains('@') {
        return Err(AppError::InvalidRequest("invalid email".to_string()));
    }
    if command.password_hash.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "password hash must not be empty".to_string(),
        ));
    }
    if command.first_name.trim().is_empty() || command.last_name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "first and last name must not be empty".to_string(),
        ));
    }
    Ok(())
}
