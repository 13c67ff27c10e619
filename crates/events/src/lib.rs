//! Audit event delivery for the validation workflow engine.
//!
//! - [`EventBus`] is an in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`AuditEvent`] is the envelope carried on the bus.
//! - [`EventBusAuditSink`] lets the engine emit audit facts onto the bus.
//! - [`AuditLogger`] is a background task that writes every event as a
//!   structured log record.

pub mod bus;
pub mod logger;
pub mod sink;

pub use bus::{AuditEvent, EventBus};
pub use logger::AuditLogger;
pub use sink::EventBusAuditSink;
