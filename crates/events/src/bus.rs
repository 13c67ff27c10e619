//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the engine's audit
//! sink and any number of subscribers.

use chrono::{DateTime, Utc};
use labflow_core::audit::{action_to_category, AuditFact};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

/// An audit fact as published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Action name, e.g. `"step_complete"`.
    pub event_type: String,

    /// Retention category derived from the action.
    pub category: String,

    pub resource_type: String,

    pub resource_id: String,

    /// Id of the user that caused the event, if any.
    pub actor_id: Option<String>,

    /// Redacted details.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl From<AuditFact> for AuditEvent {
    fn from(fact: AuditFact) -> Self {
        Self {
            category: action_to_category(&fact.action).to_string(),
            event_type: fact.action,
            resource_type: fact.resource_type,
            resource_id: fact.resource_id,
            actor_id: fact.actor_id,
            payload: fact.details,
            timestamp: fact.recorded_at,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use labflow_events::bus::EventBus;
/// use labflow_core::audit::AuditFact;
///
/// let bus = EventBus::default();
/// let _rx = bus.subscribe();
///
/// bus.publish(AuditFact::new("workflow_create", "ValidationWorkflow", "wf-1").into());
/// ```
pub struct EventBus {
    sender: broadcast::Sender<AuditEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns how many subscribers will see it; zero means it was dropped.
    pub fn publish(&self, event: AuditEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
