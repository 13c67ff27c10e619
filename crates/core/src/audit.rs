//! Audit fact emission.
//!
//! The engine only emits facts; persisting and searching them belongs to
//! whatever implements [`AuditSink`]. Emission is fire-and-forget: a failing
//! sink is logged and never fails the operation that produced the fact.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Action constants
// ---------------------------------------------------------------------------

/// Known action names for audit facts.
pub mod actions {
    pub const BOT_VALIDATION: &str = "bot_validation";
    pub const WORKFLOW_CREATE: &str = "workflow_create";
    pub const STEP_ASSIGN: &str = "step_assign";
    pub const STEP_COMPLETE: &str = "step_complete";
    pub const WORKFLOW_CANCEL: &str = "workflow_cancel";
    pub const SIGNATURE_CREATE: &str = "signature_create";
    pub const REPORT_FINALIZE: &str = "report_finalize";
}

/// Known resource types for audit facts.
pub mod resource_types {
    pub const REPORT: &str = "DiagnosticReport";
    pub const WORKFLOW: &str = "ValidationWorkflow";
}

/// Known log categories for retention grouping.
pub mod categories {
    pub const VALIDATION: &str = "validation";
    pub const WORKFLOW: &str = "workflow";
    pub const SIGNATURE: &str = "signature";
}

/// Map an action to its log category. Unknown actions are `"workflow"`.
pub fn action_to_category(action: &str) -> &'static str {
    match action {
        actions::BOT_VALIDATION => categories::VALIDATION,
        actions::SIGNATURE_CREATE => categories::SIGNATURE,
        _ => categories::WORKFLOW,
    }
}

// ---------------------------------------------------------------------------
// AuditFact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFact {
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub details: serde_json::Value,
    pub recorded_at: Timestamp,
}

impl AuditFact {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            actor_id: None,
            details: serde_json::Value::Object(Default::default()),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Attach details. Sensitive keys are redacted before they are stored.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = redact_sensitive_fields(&details);
        self
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, fact: AuditFact) -> Result<(), CoreError>;
}

/// Emit a fact, logging and discarding any sink failure.
pub async fn emit(sink: &dyn AuditSink, fact: AuditFact) {
    let action = fact.action.clone();
    let resource_id = fact.resource_id.clone();
    if let Err(e) = sink.record(fact).await {
        tracing::warn!(
            error = %e,
            action = %action,
            resource_id = %resource_id,
            "Audit sink rejected fact, continuing"
        );
    }
}

/// Sink that keeps every fact in memory, in emission order.
#[derive(Default)]
pub struct MemoryAuditSink {
    facts: Mutex<Vec<AuditFact>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> Vec<AuditFact> {
        self.facts.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn facts_for(&self, action: &str) -> Vec<AuditFact> {
        self.facts()
            .into_iter()
            .filter(|f| f.action == action)
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, fact: AuditFact) -> Result<(), CoreError> {
        self.facts
            .lock()
            .map_err(|_| CoreError::Internal("audit buffer poisoned".into()))?
            .push(fact);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Keys whose values must never reach an audit sink.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "certificate",
    "credential",
    "biometric",
    "private_key",
    "authorization",
];

/// Replace the value of any key containing a [`SENSITIVE_FIELDS`] entry
/// with `"[REDACTED]"`, recursing through objects and arrays.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
