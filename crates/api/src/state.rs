use std::sync::Arc;

use labflow_core::directory::MemoryIdentityDirectory;
use labflow_core::store::MemoryReportStore;
use labflow_core::workflow::WorkflowEngine;
use labflow_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT secret, engine knobs).
    pub config: Arc<ServerConfig>,
    /// Workflow engine driving validation, signatures and finalization.
    pub engine: Arc<WorkflowEngine>,
    /// Report snapshots, staged by the LIMS before a workflow is created.
    pub reports: Arc<MemoryReportStore>,
    /// Roles of every practitioner seen with a valid token. The engine
    /// checks assignees against it.
    pub directory: Arc<MemoryIdentityDirectory>,
    /// Audit event bus.
    pub event_bus: Arc<EventBus>,
}
