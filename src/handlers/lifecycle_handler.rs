//! Lifecycle Handlers
//!
//! Email verification, status changes and soft deletion.

use tracing::info;

use crate::aggregate::Aggregate;
use crate::domain::EventMetadata;
use crate::error::{AppError, AppResult};
use crate::repository::UserRepository;

use super::{ChangeStatusCommand, CommandResult, DeleteUserCommand, VerifyEmailCommand};

/// Handler for email verification
pub struct VerifyEmailHandler {
    repository: UserRepository,
}

impl VerifyEmailHandler {
    pub fn new(repository: UserRepository) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        command: VerifyEmailCommand,
        metadata: &EventMetadata,
    ) -> AppResult<CommandResult> {
        let user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(command.user_id.to_string()))?;

        let event = user.verify_email()?;
        let user = user.apply(event.clone());

        self.repository.save(&user, vec![event], metadata).await?;

        info!(user_id = %user.id(), "Email verified");

        Ok(CommandResult {
            user_id: user.id(),
            version: user.version(),
        })
    }
}

/// Handler for lifecycle status changes
pub struct ChangeStatusHandler {
    repository: UserRepository,
}

impl ChangeStatusHandler {
    pub fn new(repository: UserRepository) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        command: ChangeStatusCommand,
        metadata: &EventMetadata,
    ) -> AppResult<CommandResult> {
        let user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(command.user_id.to_string()))?;

        let event = user.change_status(command.status, command.reason)?;
        let user = user.apply(event.clone());

        self.repository.save(&user, vec![event], metadata).await?;

        info!(
            user_id = %user.id(),
            status = %user.status(),
            "User status changed"
        );

        Ok(CommandResult {
            user_id: user.id(),
            version: user.version(),
        })
    }
}

/// Handler for soft deletion
pub struct DeleteUserHandler {
    repository: UserRepository,
}

impl DeleteUserHandler {
    pub fn new(repository: UserRepository) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        command: DeleteUserCommand,
        metadata: &EventMetadata,
    ) -> AppResult<CommandResult> {
        let user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(command.user_id.to_string()))?;

        let event = user.delete()?;
        let user = user.apply(event.clone());

        self.repository.save(&user, vec![event], metadata).await?;

        info!(user_id = %user.id(), "User deleted");

        Ok(CommandResult {
            user_id: user.id(),
            version: user.version(),
        })
    }
}
