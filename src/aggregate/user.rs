//! User Aggregate
//!
//! Write-side user entity. State changes are expressed as a sequence of
//! versioned events; commands return the event describing the change and
//! never mutate state in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, ProfileChanges, UserEvent, UserStatus};

use super::Aggregate;

/// User Aggregate
///
/// Note: Credential handling happens upstream; the aggregate only stores
/// the opaque password hash it is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    id: Uuid,

    /// Email (unique among non-deleted users)
    email: String,

    /// Opaque credential hash
    password_hash: String,

    first_name: String,

    last_name: String,

    phone: Option<String>,

    /// Lifecycle status
    status: UserStatus,

    /// Soft-delete timestamp
    deleted_at: Option<DateTime<Utc>>,

    /// Current version (one increment per applied event)
    version: i64,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            email: String::new(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            status: UserStatus::PendingVerification,
            deleted_at: None,
            version: 0,
            created_at: None,
            updated_at: None,
        }
    }
}

impl User {
    /// Register a new user and generate the registration event
    pub fn register(
        user_id: Uuid,
        email: String,
        password_hash: String,
        first_name: String,
        last_name: String,
        phone: Option<String>,
    ) -> (Self, UserEvent) {
        let now = Utc::now();

        let event = UserEvent::UserRegistered {
            user_id,
            email: email.clone(),
            password_hash: password_hash.clone(),
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            phone: phone.clone(),
            registered_at: now,
        };

        let user = Self {
            id: user_id,
            email,
            password_hash,
            first_name,
            last_name,
            phone,
            status: UserStatus::PendingVerification,
            deleted_at: None,
            version: 1,
            created_at: Some(now),
            updated_at: Some(now),
        };

        (user, event)
    }

    /// Reconstruct a user from its persisted current-state row
    #[allow(clippy::too_many_arguments)]
    pub fn hydrate(
        id: Uuid,
        email: String,
        password_hash: String,
        first_name: String,
        last_name: String,
        phone: Option<String>,
        status: UserStatus,
        deleted_at: Option<DateTime<Utc>>,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            password_hash,
            first_name,
            last_name,
            phone,
            status,
            deleted_at,
            version,
            created_at: Some(created_at),
            updated_at: Some(updated_at),
        }
    }

    /// Confirm the user's email address
    pub fn verify_email(&self) -> Result<UserEvent, DomainError> {
        self.ensure_not_deleted()?;

        if self.status != UserStatus::PendingVerification {
            return Err(DomainError::AlreadyVerified);
        }

        Ok(UserEvent::EmailVerificationSuccess {
            user_id: self.id,
            verified_at: Utc::now(),
        })
    }

    /// Record a successful login
    pub fn record_login_success(&self) -> Result<UserEvent, DomainError> {
        self.ensure_not_deleted()?;

        Ok(UserEvent::UserLoginSuccess {
            user_id: self.id,
            logged_in_at: Utc::now(),
        })
    }

    /// Record a failed login attempt
    pub fn record_login_failure(&self) -> Result<UserEvent, DomainError> {
        self.ensure_not_deleted()?;

        Ok(UserEvent::UserLoginFailed {
            user_id: self.id,
            attempted_at: Utc::now(),
        })
    }

    /// Update profile fields
    pub fn update_profile(&self, changes: ProfileChanges) -> Result<UserEvent, DomainError> {
        self.ensure_not_deleted()?;

        if changes.is_empty() {
            return Err(DomainError::NoChanges);
        }

        Ok(UserEvent::ProfileUpdated {
            user_id: self.id,
            changes,
            updated_at: Utc::now(),
        })
    }

    /// Change the lifecycle status
    pub fn change_status(
        &self,
        status: UserStatus,
        reason: Option<String>,
    ) -> Result<UserEvent, DomainError> {
        self.ensure_not_deleted()?;

        if self.status.is_terminal() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: status,
            });
        }

        if self.status == status {
            return Err(DomainError::NoChanges);
        }

        Ok(UserEvent::UserStatusChanged {
            user_id: self.id,
            status,
            reason,
            changed_at: Utc::now(),
        })
    }

    /// Delete the user (soft delete, terminal)
    pub fn delete(&self) -> Result<UserEvent, DomainError> {
        self.ensure_not_deleted()?;

        Ok(UserEvent::UserDeleted {
            user_id: self.id,
            deleted_at: Utc::now(),
        })
    }

    fn ensure_not_deleted(&self) -> Result<(), DomainError> {
        if self.deleted_at.is_some() {
            return Err(DomainError::UserDeleted);
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Aggregate for User {
    type Event = UserEvent;

    fn aggregate_type() -> &'static str {
        "User"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            UserEvent::UserRegistered {
                user_id,
                email,
                password_hash,
                first_name,
                last_name,
                phone,
                registered_at,
            } => {
                self.id = user_id;
                self.email = email;
                self.password_hash = password_hash;
                self.first_name = first_name;
                self.last_name = last_name;
                self.phone = phone;
                self.status = UserStatus::PendingVerification;
                self.created_at = Some(registered_at);
                self.updated_at = Some(registered_at);
            }

            UserEvent::EmailVerificationSuccess { verified_at, .. } => {
                self.status = UserStatus::Accepted;
                self.updated_at = Some(verified_at);
            }

            // Login events change projection counters, not write-side state
            UserEvent::UserLoginSuccess { logged_in_at, .. } => {
                self.updated_at = Some(logged_in_at);
            }

            UserEvent::UserLoginFailed { attempted_at, .. } => {
                self.updated_at = Some(attempted_at);
            }

            UserEvent::ProfileUpdated {
                changes,
                updated_at,
                ..
            } => {
                if let Some(first_name) = changes.first_name {
                    self.first_name = first_name;
                }
                if let Some(last_name) = changes.last_name {
                    self.last_name = last_name;
                }
                if let Some(phone) = changes.phone {
                    self.phone = Some(phone);
                }
                self.updated_at = Some(updated_at);
            }

            UserEvent::UserStatusChanged {
                status, changed_at, ..
            } => {
                self.status = status;
                self.updated_at = Some(changed_at);
            }

            UserEvent::UserDeleted { deleted_at, .. } => {
                self.status = UserStatus::Blocked;
                self.deleted_at = Some(deleted_at);
                self.updated_at = Some(deleted_at);
            }
        }

        self.version += 1;
        self
    }
}
