//! User lifecycle status

use serde::{Deserialize, Serialize};

/// Lifecycle status of a user aggregate
///
/// The projection stores the snake_case string mirror of this enum and may
/// lag behind the write side until the sync engine catches up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    PendingVerification,
    Accepted,
    Inactive,
    Suspended,
    /// Terminal state reached through deletion
    Blocked,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::PendingVerification
    }
}

impl UserStatus {
    /// String mirror used by the projection row
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::PendingVerification => "pending_verification",
            UserStatus::Accepted => "accepted",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
            UserStatus::Blocked => "blocked",
        }
    }

    /// Parse the projection string mirror back into a status
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_verification" => Some(UserStatus::PendingVerification),
            "accepted" => Some(UserStatus::Accepted),
            "inactive" => Some(UserStatus::Inactive),
            "suspended" => Some(UserStatus::Suspended),
            "blocked" => Some(UserStatus::Blocked),
            _ => None,
        }
    }

    /// Terminal statuses admit no further lifecycle transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, UserStatus::Blocked)
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            UserStatus::PendingVerification,
            UserStatus::Accepted,
            UserStatus::Inactive,
            UserStatus::Suspended,
            UserStatus::Blocked,
        ] {
            assert_eq!(UserStatus::parse(status.as_str()), Some(status));
        }

        assert_eq!(UserStatus::parse("nonsense"), None);
    }

    #[test]
    fn test_serde_mirror_matches_as_str() {
        let json = serde_json::to_string(&UserStatus::PendingVerification).unwrap();
        assert_eq!(json, r#""pending_verification""#);
    }

    #[test]
    fn test_terminal() {
        assert!(UserStatus::Blocked.is_terminal());
        assert!(!UserStatus::Suspended.is_terminal());
    }
}
