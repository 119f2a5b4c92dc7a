//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ProfileChanges, UserStatus};

/// Command to register a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserCommand {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl RegisterUserCommand {
    pub fn new(email: String, password_hash: String, first_name: String, last_name: String) -> Self {
        Self {
            email,
            password_hash,
            first_name,
            last_name,
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: String) -> Self {
        self.phone = Some(phone);
        self
    }
}

/// Command to verify a user's email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailCommand {
    pub user_id: Uuid,
}

/// Command to record a login attempt outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLoginCommand {
    pub user_id: Uuid,
    pub successful: bool,
}

impl RecordLoginCommand {
    pub fn success(user_id: Uuid) -> Self {
        Self {
            user_id,
            successful: true,
        }
    }

    pub fn failure(user_id: Uuid) -> Self {
        Self {
            user_id,
            successful: false,
        }
    }
}

/// Command to update profile fields; unset fields stay unchanged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileCommand {
    pub user_id: Uuid,
    pub changes: ProfileChanges,
}

/// Command to change a user's lifecycle status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeStatusCommand {
    pub user_id: Uuid,
    pub status: UserStatus,
    pub reason: Option<String>,
}

impl ChangeStatusCommand {
    pub fn new(user_id: Uuid, status: UserStatus) -> Self {
        Self {
            user_id,
            status,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: String) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// Command to soft-delete a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserCommand {
    pub user_id: Uuid,
}

/// Result of a successful registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserResult {
    pub user_id: Uuid,
    pub email: String,
    pub status: String,
    pub version: i64,
}

/// Result of any command against an existing user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub user_id: Uuid,
    pub version: i64,
}
