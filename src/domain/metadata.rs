//! Event Metadata
//!
//! Metadata recorded alongside every stored event for audit and tracing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to an event, used for auditing and tracing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation ID tying events to the request that caused them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// ID of the event that caused this one, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,

    /// User or system actor that triggered the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,

    /// Free-form extension values
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// Create new empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Set the causation ID
    pub fn with_causation_id(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    /// Set the actor
    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Add a free-form extension value
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Generate a correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let correlation_id = Uuid::new_v4();
        let actor_id = Uuid::new_v4();

        let metadata = EventMetadata::new()
            .with_correlation_id(correlation_id)
            .with_actor(actor_id)
            .with_extension("source", serde_json::json!("admin-console"));

        assert_eq!(metadata.correlation_id, Some(correlation_id));
        assert_eq!(metadata.actor_id, Some(actor_id));
        assert_eq!(
            metadata.extensions.get("source"),
            Some(&serde_json::json!("admin-console"))
        );
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut metadata = EventMetadata::new();
        assert!(metadata.correlation_id.is_none());

        let id = metadata.ensure_correlation_id();
        assert_eq!(metadata.correlation_id, Some(id));

        // Calling again should return the same ID
        let id2 = metadata.ensure_correlation_id();
        assert_eq!(id, id2);
    }

    #[test]
    fn test_empty_metadata_serializes_to_empty_object() {
        let json = serde_json::to_value(EventMetadata::new()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
