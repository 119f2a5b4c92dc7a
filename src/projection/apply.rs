//! Event-to-projection dispatch
//!
//! One dispatch function routes every stored event to the matching
//! projection write. Both the sync engine's catch-up loop and the
//! post-commit fast path go through here, so the read model is updated
//! the same way regardless of which path delivered the event.

use tracing::{debug, warn};

use crate::domain::UserEvent;
use crate::event_store::StoredEvent;

use super::store::{ProjectionError, ProjectionStore};

/// Outcome of applying one stored event to the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The projection row changed
    Applied,
    /// Nothing to do: unknown event type, or the row already reflects
    /// this event (at-least-once redelivery)
    Skipped,
}

/// Apply one stored event to the user projection.
///
/// Unknown event types are logged and skipped so old consumers survive
/// new producers. A malformed payload for a known type is an error: it
/// means the log and the code disagree, and silently dropping it would
/// corrupt the read model.
pub async fn apply_event(
    store: &ProjectionStore,
    stored: &StoredEvent,
) -> Result<Applied, ProjectionError> {
    if !UserEvent::KNOWN_TYPES.contains(&stored.event_type.as_str()) {
        warn!(
            event_type = %stored.event_type,
            global_seq = stored.global_seq,
            "Skipping unknown event type"
        );
        return Ok(Applied::Skipped);
    }

    let event: UserEvent = serde_json::from_value(stored.event_data.clone()).map_err(|e| {
        ProjectionError::InvalidPayload {
            event_type: stored.event_type.clone(),
            source: e,
        }
    })?;

    let version = stored.version;
    let applied = match event {
        UserEvent::UserRegistered {
            user_id,
            email,
            first_name,
            last_name,
            phone,
            registered_at,
            ..
        } => {
            store
                .apply_registered(
                    user_id,
                    &email,
                    &first_name,
                    &last_name,
                    phone.as_deref(),
                    registered_at,
                    version,
                )
                .await?
        }

        UserEvent::EmailVerificationSuccess {
            user_id,
            verified_at,
        } => {
            store
                .apply_email_verified(user_id, verified_at, version)
                .await?
        }

        UserEvent::UserLoginSuccess {
            user_id,
            logged_in_at,
        } => {
            store
                .apply_login_success(user_id, logged_in_at, version)
                .await?
        }

        UserEvent::UserLoginFailed { user_id, .. } => {
            store.apply_login_failure(user_id, version).await?
        }

        UserEvent::ProfileUpdated {
            user_id,
            changes,
            updated_at,
        } => {
            store
                .apply_profile_updated(user_id, &changes, updated_at, version)
                .await?
        }

        UserEvent::UserStatusChanged {
            user_id,
            status,
            changed_at,
            ..
        } => {
            store
                .apply_status_changed(user_id, status.as_str(), changed_at, version)
                .await?
        }

        UserEvent::UserDeleted {
            user_id,
            deleted_at,
        } => store.apply_deleted(user_id, deleted_at, version).await?,
    };

    if applied {
        Ok(Applied::Applied)
    } else {
        debug!(
            event_type = %stored.event_type,
            aggregate_id = %stored.aggregate_id,
            version,
            "Projection already at or past this event, skipped"
        );
        Ok(Applied::Skipped)
    }
}
