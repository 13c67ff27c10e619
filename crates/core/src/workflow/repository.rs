//! Workflow persistence.
//!
//! Writes are guarded by an optimistic version check: `save` succeeds only
//! when the stored version equals the one the caller loaded, then bumps it.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::types::WorkflowId;

use super::model::Workflow;

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Store a new workflow. `Conflict` if the report already has a live one.
    async fn insert(&self, workflow: Workflow) -> Result<Workflow, CoreError>;

    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, CoreError>;

    /// The non-terminal workflow for `report_id`, if any.
    async fn find_active_for_report(&self, report_id: &str) -> Result<Option<Workflow>, CoreError>;

    /// Every workflow ever created for `report_id`, oldest first.
    async fn list_for_report(&self, report_id: &str) -> Result<Vec<Workflow>, CoreError>;

    /// Replace the stored workflow if its version is still
    /// `expected_version`. Returns the stored copy with the bumped version.
    async fn save(&self, workflow: &Workflow, expected_version: u64) -> Result<Workflow, CoreError>;
}

/// In-process repository keyed by workflow id.
#[derive(Default)]
pub struct MemoryWorkflowRepository {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl MemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRepository for MemoryWorkflowRepository {
    async fn insert(&self, workflow: Workflow) -> Result<Workflow, CoreError> {
        let mut workflows = self.workflows.write().await;
        if let Some(existing) = workflows
            .values()
            .find(|w| w.report_id == workflow.report_id && !w.is_terminal())
        {
            return Err(CoreError::Conflict(format!(
                "Report {} already has an active workflow ({})",
                workflow.report_id, existing.id
            )));
        }
        if workflows.contains_key(&workflow.id) {
            return Err(CoreError::Conflict(format!("Workflow {} already exists", workflow.id)));
        }
        workflows.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, CoreError> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn find_active_for_report(&self, report_id: &str) -> Result<Option<Workflow>, CoreError> {
        Ok(self
            .workflows
            .read()
            .await
            .values()
            .find(|w| w.report_id == report_id && !w.is_terminal())
            .cloned())
    }

    async fn list_for_report(&self, report_id: &str) -> Result<Vec<Workflow>, CoreError> {
        let mut found: Vec<Workflow> = self
            .workflows
            .read()
            .await
            .values()
            .filter(|w| w.report_id == report_id)
            .cloned()
            .collect();
        found.sort_by_key(|w| (w.created_at, w.id));
        Ok(found)
    }

    async fn save(&self, workflow: &Workflow, expected_version: u64) -> Result<Workflow, CoreError> {
        let mut workflows = self.workflows.write().await;
        let stored = workflows
            .get_mut(&workflow.id)
            .ok_or_else(|| CoreError::not_found("Workflow", workflow.id))?;
        if stored.version != expected_version {
            return Err(CoreError::Conflict(format!(
                "Workflow {} was modified concurrently (expected version {expected_version}, found {})",
                workflow.id, stored.version
            )));
        }
        let mut next = workflow.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        Ok(next)
    }
}
