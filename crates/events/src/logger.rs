//! Audit log writer.
//!
//! [`AuditLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every event as a structured `tracing` record under the `audit`
//! target. Durable storage is left to whatever collects those records. The
//! loop exits when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::AuditEvent;

pub struct AuditLogger;

impl AuditLogger {
    /// Run until the channel closes. Returns the number of events written.
    pub async fn run(mut receiver: broadcast::Receiver<AuditEvent>) -> u64 {
        let mut written = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::write(&event);
                    written += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Audit logger lagged, some events were not written"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(written, "Event bus closed, audit logger shutting down");
                    break;
                }
            }
        }
        written
    }

    fn write(event: &AuditEvent) {
        tracing::info!(
            target: "audit",
            event_type = %event.event_type,
            category = %event.category,
            resource_type = %event.resource_type,
            resource_id = %event.resource_id,
            actor_id = event.actor_id.as_deref().unwrap_or("-"),
            payload = %event.payload,
            timestamp = %event.timestamp.to_rfc3339(),
            "audit"
        );
    }
}
