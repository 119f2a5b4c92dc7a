//! Profile Update Handler
//!
//! Merges changed profile fields into an existing user.

use tracing::info;

use crate::aggregate::Aggregate;
use crate::domain::EventMetadata;
use crate::error::{AppError, AppResult};
use crate::repository::UserRepository;

use super::{CommandResult, UpdateProfileCommand};

/// Handler for profile updates
pub struct UpdateProfileHandler {
    repository: UserRepository,
}

impl UpdateProfileHandler {
    pub fn new(repository: UserRepository) -> Self {
        Self { repository }
    }

    /// Execute the profile update command
    pub async fn execute(
        &self,
        command: UpdateProfileCommand,
        metadata: &EventMetadata,
    ) -> AppResult<CommandResult> {
        let user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(command.user_id.to_string()))?;

        let event = user.update_profile(command.changes)?;
        let user = user.apply(event.clone());

        self.repository.save(&user, vec![event], metadata).await?;

        info!(user_id = %user.id(), version = user.version(), "Profile updated");

        Ok(CommandResult {
            user_id: user.id(),
            version: user.version(),
        })
    }
}
