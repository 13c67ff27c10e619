//! [`AuditSink`] implementation that publishes onto the [`EventBus`].

use std::sync::Arc;

use async_trait::async_trait;
use labflow_core::audit::{AuditFact, AuditSink};
use labflow_core::error::CoreError;

use crate::bus::{AuditEvent, EventBus};

pub struct EventBusAuditSink {
    bus: Arc<EventBus>,
}

impl EventBusAuditSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl AuditSink for EventBusAuditSink {
    /// Fails when nobody is subscribed, so the engine logs the lost fact.
    async fn record(&self, fact: AuditFact) -> Result<(), CoreError> {
        if self.bus.publish(AuditEvent::from(fact)) == 0 {
            return Err(CoreError::Collaborator {
                collaborator: "audit bus",
                message: "no subscribers, event dropped".into(),
            });
        }
        Ok(())
    }
}
