//! Workflow orchestration.
//!
//! [`WorkflowEngine`] ties the planner, state machine, bot engine, signature
//! service and finalizer to the collaborator traits. Every transition loads
//! the workflow, mutates a copy, and commits it with the version it loaded;
//! a concurrent writer makes the commit fail with `Conflict`.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::actor::ActorContext;
use crate::audit::{self, actions, resource_types, AuditFact, AuditSink};
use crate::config::EngineConfig;
use crate::directory::IdentityDirectory;
use crate::error::CoreError;
use crate::finalizer::{FinalizeOutcome, Finalizer};
use crate::report::ReportSnapshot;
use crate::roles::holds_any;
use crate::signature::{CredentialValidator, DigitalSignature, SignatureCredentials, SignatureService};
use crate::store::ReportStore;
use crate::types::WorkflowId;
use crate::validation::bots::Bot;
use crate::validation::engine::{BotEngine, BotRun};
use crate::validation::rules::has_unresolved_errors;

use super::machine::{Advance, Completion};
use super::model::{Step, StepOutcome, Workflow, WorkflowPriority, WorkflowStatus};
use super::planner::plan_steps;
use super::repository::WorkflowRepository;

/// Result of running the bots for a workflow's automatic step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoValidation {
    pub workflow: Workflow,
    pub run: BotRun,
}

/// Result of an ad-hoc bot run. Nothing is persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationPreview {
    pub run: BotRun,
    /// The report with any auto-fixes applied.
    pub report: ReportSnapshot,
}

/// Arguments for [`WorkflowEngine::complete_step`].
#[derive(Debug, Clone)]
pub struct CompleteStep {
    pub outcome: StepOutcome,
    pub notes: Option<String>,
    pub signature: Option<DigitalSignature>,
}

pub struct WorkflowEngine {
    reports: Arc<dyn ReportStore>,
    workflows: Arc<dyn WorkflowRepository>,
    directory: Arc<dyn IdentityDirectory>,
    audit: Arc<dyn AuditSink>,
    bots: BotEngine,
    signatures: SignatureService,
    finalizer: Finalizer,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        workflows: Arc<dyn WorkflowRepository>,
        credentials: Arc<dyn CredentialValidator>,
        directory: Arc<dyn IdentityDirectory>,
        audit: Arc<dyn AuditSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            bots: BotEngine::with_defaults(Arc::clone(&audit)),
            signatures: SignatureService::new(credentials, Arc::clone(&audit)),
            finalizer: Finalizer::new(Arc::clone(&reports), Arc::clone(&audit)),
            reports,
            workflows,
            directory,
            audit,
            config,
        }
    }

    /// Replace the default bot engine.
    pub fn with_bot_engine(mut self, bots: BotEngine) -> Self {
        self.bots = bots;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bots(&self) -> &[Bot] {
        self.bots.bots()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, CoreError> {
        self.workflows
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Workflow", id))
    }

    pub async fn active_workflow_for_report(&self, report_id: &str) -> Result<Workflow, CoreError> {
        self.workflows
            .find_active_for_report(report_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Workflow", format!("active for report {report_id}")))
    }

    /// The steps a workflow for this report would get, without creating it.
    pub async fn plan(&self, report_id: &str) -> Result<Vec<Step>, CoreError> {
        let report = self.reports.read_report(report_id).await?;
        Ok(plan_steps(&report, &self.config))
    }

    /// Run the bots against the stored report without persisting fixes.
    pub async fn validate_report(&self, report_id: &str) -> Result<ValidationPreview, CoreError> {
        let mut report = self.reports.read_report(report_id).await?;
        let run = self.bots.run(&mut report).await;
        Ok(ValidationPreview { run, report })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    pub async fn create_workflow(
        &self,
        report_id: &str,
        priority: WorkflowPriority,
        actor: &ActorContext,
    ) -> Result<Workflow, CoreError> {
        let report = self.reports.read_report(report_id).await?;
        if report.is_final() {
            return Err(CoreError::InvalidState(format!(
                "Report {report_id} is already final"
            )));
        }

        let steps = plan_steps(&report, &self.config);
        let workflow = self
            .workflows
            .insert(Workflow::new(report_id, priority, steps, Utc::now()))
            .await?;

        tracing::info!(
            workflow_id = %workflow.id,
            report_id,
            priority = workflow.priority.as_str(),
            steps = ?workflow.step_ids(),
            "Workflow created"
        );
        self.record(
            AuditFact::new(actions::WORKFLOW_CREATE, resource_types::WORKFLOW, workflow.id.to_string())
                .with_actor(&actor.user_id)
                .with_details(json!({
                    "reportId": report_id,
                    "priority": workflow.priority.as_str(),
                    "steps": workflow.step_ids(),
                })),
        )
        .await;

        Ok(workflow)
    }

    /// Assign the current step to `assignee_id`.
    ///
    /// With `enforce_assignment_roles` set, the assignee's roles are looked
    /// up in the identity directory and must include one of the step's
    /// required roles.
    pub async fn assign_step(
        &self,
        workflow_id: WorkflowId,
        step_id: &str,
        assignee_id: &str,
        actor: &ActorContext,
    ) -> Result<Workflow, CoreError> {
        let assignee_roles = if self.config.enforce_assignment_roles {
            Some(self.directory.roles_of(assignee_id).await?)
        } else {
            None
        };
        let workflow = self
            .transition(workflow_id, |wf| {
                if let Some(roles) = &assignee_roles {
                    let step = wf.assignable_step(step_id)?;
                    if !holds_any(roles, &step.required_role) {
                        return Err(CoreError::Forbidden(format!(
                            "Assignee {assignee_id} holds none of: {}",
                            step.required_role.join(", ")
                        )));
                    }
                }
                wf.assign_step(step_id, assignee_id, Utc::now())
            })
            .await?
            .0;

        tracing::info!(
            workflow_id = %workflow.id,
            report_id = %workflow.report_id,
            step_id,
            assignee_id,
            "Step assigned"
        );
        self.record(
            AuditFact::new(actions::STEP_ASSIGN, resource_types::WORKFLOW, workflow.id.to_string())
                .with_actor(&actor.user_id)
                .with_details(json!({
                    "reportId": workflow.report_id,
                    "stepId": step_id,
                    "assigneeId": assignee_id,
                    "ipAddress": actor.ip_address,
                })),
        )
        .await;

        Ok(workflow)
    }

    /// Complete or fail the current step, then finalize the report if that
    /// was the last step.
    ///
    /// An attached signature must have come from
    /// [`create_signature`](Self::create_signature) on this engine.
    ///
    /// The transition is committed before finalization starts. If the report
    /// store fails during finalization the error is returned and
    /// [`finalize_report`](Self::finalize_report) can be retried.
    pub async fn complete_step(
        &self,
        workflow_id: WorkflowId,
        step_id: &str,
        request: CompleteStep,
        actor: &ActorContext,
    ) -> Result<Workflow, CoreError> {
        if let Some(signature) = &request.signature {
            if !self.signatures.was_issued(signature).await {
                return Err(CoreError::InvalidState(
                    "Signature was not issued by this engine".into(),
                ));
            }
            self.ensure_signature_unused(signature).await?;
        }

        let signed = request.signature.is_some();
        let outcome = request.outcome;
        let notes = request.notes.clone();
        let (workflow, advance) = self
            .transition(workflow_id, |wf| {
                wf.complete_step(
                    step_id,
                    Completion {
                        outcome: request.outcome,
                        notes: request.notes,
                        signature: request.signature,
                        actor,
                        now: Utc::now(),
                    },
                )
            })
            .await?;

        tracing::info!(
            workflow_id = %workflow.id,
            report_id = %workflow.report_id,
            step_id,
            outcome = outcome.as_str(),
            status = %workflow.status,
            "Step completed"
        );
        self.record(
            AuditFact::new(actions::STEP_COMPLETE, resource_types::WORKFLOW, workflow.id.to_string())
                .with_actor(&actor.user_id)
                .with_details(json!({
                    "reportId": workflow.report_id,
                    "stepId": step_id,
                    "outcome": outcome.as_str(),
                    "notes": notes,
                    "signatureAttached": signed,
                    "workflowStatus": workflow.status.as_str(),
                    "currentStep": workflow.current_step,
                    "ipAddress": actor.ip_address,
                    "userAgent": actor.user_agent,
                })),
        )
        .await;

        if advance == Advance::Completed {
            self.finalizer
                .finalize(&workflow.report_id, &actor.user_id)
                .await?;
        }
        Ok(workflow)
    }

    /// Run the bots for the workflow's automatic step and complete it as the
    /// system actor.
    ///
    /// Applied fixes are written back to the report store. The step fails,
    /// rejecting the workflow, when any `error` result is left unresolved.
    ///
    /// Fixes are saved before the step is committed, so a failed commit
    /// leaves the fixed report in place with the step still pending and a
    /// rerun finds nothing left to fix.
    pub async fn run_auto_validation(&self, workflow_id: WorkflowId) -> Result<AutoValidation, CoreError> {
        let workflow = self.get_workflow(workflow_id).await?;
        let step = workflow.current().ok_or_else(|| {
            CoreError::InvalidState(format!("Workflow {workflow_id} is {}", workflow.status))
        })?;
        if !step.is_automatic() {
            return Err(CoreError::InvalidState(format!(
                "Current step '{}' is not automatic",
                step.id
            )));
        }
        let step_id = step.id.clone();

        let mut report = self.reports.read_report(&workflow.report_id).await?;
        let run = self.bots.run(&mut report).await;
        if run.report_modified {
            self.reports.save_report(&report).await?;
            tracing::info!(report_id = %report.id, "Persisted auto-fixes");
        }

        let outcome = if has_unresolved_errors(&run.results) {
            StepOutcome::Failed
        } else {
            StepOutcome::Completed
        };
        let notes = format!(
            "{} results, {} errors, {} warnings, {} auto-fixed",
            run.summary.result_count,
            run.summary.error_count,
            run.summary.warning_count,
            run.summary.auto_fixed_count
        );

        let workflow = self
            .complete_step(
                workflow_id,
                &step_id,
                CompleteStep {
                    outcome,
                    notes: Some(notes),
                    signature: None,
                },
                &ActorContext::system(),
            )
            .await?;
        Ok(AutoValidation { workflow, run })
    }

    pub async fn cancel_workflow(
        &self,
        workflow_id: WorkflowId,
        reason: Option<String>,
        actor: &ActorContext,
    ) -> Result<Workflow, CoreError> {
        let (workflow, _) = self
            .transition(workflow_id, |wf| wf.cancel(Utc::now()))
            .await?;

        tracing::info!(
            workflow_id = %workflow.id,
            report_id = %workflow.report_id,
            reason = reason.as_deref().unwrap_or(""),
            "Workflow cancelled"
        );
        self.record(
            AuditFact::new(actions::WORKFLOW_CANCEL, resource_types::WORKFLOW, workflow.id.to_string())
                .with_actor(&actor.user_id)
                .with_details(json!({
                    "reportId": workflow.report_id,
                    "reason": reason,
                })),
        )
        .await;

        Ok(workflow)
    }

    /// Sign `report_id` as `actor`.
    pub async fn create_signature(
        &self,
        report_id: &str,
        method: &str,
        credentials: &SignatureCredentials,
        actor: Option<&ActorContext>,
    ) -> Result<DigitalSignature, CoreError> {
        let actor = actor
            .filter(|a| !a.user_id.is_empty())
            .ok_or_else(|| CoreError::Authentication("Signing requires an authenticated user".into()))?;
        self.reports.read_report(report_id).await?;
        self.signatures
            .create_signature(report_id, method, credentials, Some(actor))
            .await
    }

    /// Retry finalization for a report whose workflow has completed.
    pub async fn finalize_report(
        &self,
        report_id: &str,
        actor: &ActorContext,
    ) -> Result<FinalizeOutcome, CoreError> {
        let completed = self
            .workflows
            .list_for_report(report_id)
            .await?
            .into_iter()
            .any(|w| w.status == WorkflowStatus::Completed);
        if !completed {
            return Err(CoreError::InvalidState(format!(
                "Report {report_id} has no completed workflow"
            )));
        }
        self.finalizer.finalize(report_id, &actor.user_id).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Load, mutate a copy, commit with the loaded version.
    async fn transition<T>(
        &self,
        workflow_id: WorkflowId,
        apply: impl FnOnce(&mut Workflow) -> Result<T, CoreError>,
    ) -> Result<(Workflow, T), CoreError> {
        let current = self.get_workflow(workflow_id).await?;
        let mut next = current.clone();
        let out = apply(&mut next)?;
        let saved = self.workflows.save(&next, current.version).await?;
        Ok((saved, out))
    }

    /// A signature may back only one step across every workflow of its report.
    async fn ensure_signature_unused(&self, signature: &DigitalSignature) -> Result<(), CoreError> {
        let used = self
            .workflows
            .list_for_report(&signature.report_id)
            .await?
            .iter()
            .any(|w| {
                w.attached_signature_hashes()
                    .any(|h| h == signature.signature_hash)
            });
        if used {
            return Err(CoreError::InvalidState(
                "Signature is already attached to another step".into(),
            ));
        }
        Ok(())
    }

    async fn record(&self, fact: AuditFact) {
        audit::emit(self.audit.as_ref(), fact).await;
    }
}
