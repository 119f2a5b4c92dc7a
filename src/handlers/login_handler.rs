//! Login Recording Handler
//!
//! Records login attempt outcomes as events. The projection turns these
//! into the last-login timestamp and the attempt counters.

use tracing::debug;

use crate::aggregate::Aggregate;
use crate::domain::EventMetadata;
use crate::error::{AppError, AppResult};
use crate::repository::UserRepository;

use super::{CommandResult, RecordLoginCommand};

/// Handler for login attempt recording
pub struct RecordLoginHandler {
    repository: UserRepository,
}

impl RecordLoginHandler {
    pub fn new(repository: UserRepository) -> Self {
        Self { repository }
    }

    /// Execute the login recording command
    pub async fn execute(
        &self,
        command: RecordLoginCommand,
        metadata: &EventMetadata,
    ) -> AppResult<CommandResult> {
        let user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(command.user_id.to_string()))?;

        let event = if command.successful {
            user.record_login_success()?
        } else {
            user.record_login_failure()?
        };
        let user = user.apply(event.clone());

        self.repository.save(&user, vec![event], metadata).await?;

        debug!(
            user_id = %user.id(),
            successful = command.successful,
            "Login attempt recorded"
        );

        Ok(CommandResult {
            user_id: user.id(),
            version: user.version(),
        })
    }
}
