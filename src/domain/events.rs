//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened in the system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserStatus;

/// User-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserEvent {
    /// A new user registered
    UserRegistered {
        user_id: Uuid,
        email: String,
        password_hash: String,
        first_name: String,
        last_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
        registered_at: DateTime<Utc>,
    },

    /// The user verified their email address
    EmailVerificationSuccess {
        user_id: Uuid,
        verified_at: DateTime<Utc>,
    },

    /// The user logged in successfully
    UserLoginSuccess {
        user_id: Uuid,
        logged_in_at: DateTime<Utc>,
    },

    /// A login attempt for the user failed
    UserLoginFailed {
        user_id: Uuid,
        attempted_at: DateTime<Utc>,
    },

    /// User profile fields were changed
    ProfileUpdated {
        user_id: Uuid,
        changes: ProfileChanges,
        updated_at: DateTime<Utc>,
    },

    /// Lifecycle status changed (activation, suspension, ...)
    UserStatusChanged {
        user_id: Uuid,
        status: UserStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        changed_at: DateTime<Utc>,
    },

    /// User was deleted (soft delete)
    UserDeleted {
        user_id: Uuid,
        deleted_at: DateTime<Utc>,
    },
}

/// Changes made to a user profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileChanges {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone.is_none()
    }
}

impl UserEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserRegistered { .. } => "UserRegistered",
            UserEvent::EmailVerificationSuccess { .. } => "EmailVerificationSuccess",
            UserEvent::UserLoginSuccess { .. } => "UserLoginSuccess",
            UserEvent::UserLoginFailed { .. } => "UserLoginFailed",
            UserEvent::ProfileUpdated { .. } => "ProfileUpdated",
            UserEvent::UserStatusChanged { .. } => "UserStatusChanged",
            UserEvent::UserDeleted { .. } => "UserDeleted",
        }
    }

    /// Get the user ID this event relates to
    pub fn user_id(&self) -> Uuid {
        match self {
            UserEvent::UserRegistered { user_id, .. } => *user_id,
            UserEvent::EmailVerificationSuccess { user_id, .. } => *user_id,
            UserEvent::UserLoginSuccess { user_id, .. } => *user_id,
            UserEvent::UserLoginFailed { user_id, .. } => *user_id,
            UserEvent::ProfileUpdated { user_id, .. } => *user_id,
            UserEvent::UserStatusChanged { user_id, .. } => *user_id,
            UserEvent::UserDeleted { user_id, .. } => *user_id,
        }
    }

    /// Event types the projection layer knows how to apply
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "UserRegistered",
        "EmailVerificationSuccess",
        "UserLoginSuccess",
        "UserLoginFailed",
        "ProfileUpdated",
        "UserStatusChanged",
        "UserDeleted",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_event_serialization() {
        let event = UserEvent::UserRegistered {
            user_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2$stub".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            phone: None,
            registered_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("UserRegistered"));
        // Unset optional fields are omitted entirely
        assert!(!json.contains("phone"));

        let deserialized: UserEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(event.user_id(), deserialized.user_id());
    }

    #[test]
    fn test_status_changed_round_trip() {
        let event = UserEvent::UserStatusChanged {
            user_id: Uuid::new_v4(),
            status: UserStatus::Suspended,
            reason: Some("abuse report".to_string()),
            changed_at: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "UserStatusChanged");
        assert_eq!(value["status"], "suspended");

        let back: UserEvent = serde_json::from_value(value).unwrap();
        assert!(matches!(
            back,
            UserEvent::UserStatusChanged {
                status: UserStatus::Suspended,
                ..
            }
        ));
    }

    #[test]
    fn test_profile_changes_is_empty() {
        assert!(ProfileChanges::default().is_empty());

        let changes = ProfileChanges {
            phone: Some("+15550100".to_string()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_known_types_matches_variants() {
        let event = UserEvent::UserDeleted {
            user_id: Uuid::new_v4(),
            deleted_at: Utc::now(),
        };
        assert!(UserEvent::KNOWN_TYPES.contains(&event.event_type()));
    }
}
