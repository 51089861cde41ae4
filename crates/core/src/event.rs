//! Domain event system: decoupled observation of pipeline progress.
//!
//! The orchestrators publish an event for every session status change and
//! stage failure. Subscribers filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::session::SessionStatus;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A session was created for a roster
    SessionCreated {
        session_id: String,
        roster_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A session moved between pipeline stages
    SessionStatusChanged {
        session_id: String,
        from: SessionStatus,
        to: SessionStatus,
        timestamp: DateTime<Utc>,
    },

    /// A pipeline stage failed
    StageFailed {
        session_id: String,
        stage: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The background explanation pass finished
    JustificationFinished {
        session_id: String,
        generated: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
