//! In-process event bus
//!
//! Broadcasts committed events to in-process subscribers. This is a
//! best-effort fast-path trigger: the periodic catch-up run repairs any
//! missed delivery, so no subscriber may rely on receiving every event.

use tokio::sync::broadcast;

use crate::event_store::StoredEvent;

/// Default buffer before slow subscribers start missing events
const DEFAULT_CAPACITY: usize = 256;

/// In-process broadcast bus for committed events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoredEvent>,
}

impl EventBus {
    /// Create a bus with the default buffer capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit buffer capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a committed event to all current subscribers.
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: &StoredEvent) -> usize {
        match self.tx.send(event.clone()) {
            Ok(receivers) => receivers,
            // No subscribers; nothing to deliver
            Err(_) => 0,
        }
    }

    /// Subscribe to events committed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
