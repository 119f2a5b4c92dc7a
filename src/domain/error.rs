//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::UserStatus;

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// User is deleted and admits no further commands
    #[error("User is deleted")]
    UserDeleted,

    /// Email was already verified
    #[error("Email is already verified")]
    AlreadyVerified,

    /// Command carried no effective change
    #[error("No changes provided")]
    NoChanges,

    /// Lifecycle transition not permitted
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: UserStatus, to: UserStatus },

    /// Business rule violation
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),
}

impl DomainError {
    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UserDeleted
                | Self::AlreadyVerified
                | Self::NoChanges
                | Self::InvalidStatusTransition { .. }
                | Self::BusinessRuleViolation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = DomainError::InvalidStatusTransition {
            from: UserStatus::Blocked,
            to: UserStatus::Accepted,
        };

        assert!(err.is_client_error());
        assert!(err.to_string().contains("blocked"));
        assert!(err.to_string().contains("accepted"));
    }

    #[test]
    fn test_no_changes_error() {
        let err = DomainError::NoChanges;
        assert!(err.is_client_error());
    }
}
