//! Workflow state transitions.
//!
//! Pure mutations of a [`Workflow`] value. Persistence, audit and
//! finalization are the caller's job; a transition that returns `Err` leaves
//! the workflow untouched.

use crate::actor::ActorContext;
use crate::error::CoreError;
use crate::signature::DigitalSignature;
use crate::types::Timestamp;

use super::model::{Step, StepOutcome, StepStatus, Workflow, WorkflowStatus};

/// What a committed step completion did to the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The workflow moved on to this step.
    Next(String),
    /// The last step completed; the report should now be finalized.
    Completed,
    /// The step failed and the workflow was rejected.
    Rejected,
}

/// Inputs to [`Workflow::complete_step`].
#[derive(Debug, Clone)]
pub struct Completion<'a> {
    pub outcome: StepOutcome,
    pub notes: Option<String>,
    pub signature: Option<DigitalSignature>,
    pub actor: &'a ActorContext,
    pub now: Timestamp,
}

impl Workflow {
    /// Resolve `step_id` to the current step of a live workflow.
    fn current_step_checked(&self, step_id: &str) -> Result<usize, CoreError> {
        let index = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| CoreError::not_found("Step", step_id))?;
        if self.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Workflow {} is {}",
                self.id, self.status
            )));
        }
        if self.current_step.as_deref() != Some(step_id) {
            return Err(CoreError::InvalidState(format!(
                "Step '{step_id}' is not the current step (current: {})",
                self.current_step.as_deref().unwrap_or("none")
            )));
        }
        Ok(index)
    }

    /// The current step, if it can still be assigned.
    pub fn assignable_step(&self, step_id: &str) -> Result<&Step, CoreError> {
        let index = self.current_step_checked(step_id)?;
        Ok(&self.steps[index])
    }

    /// Assign the current step. Reassigning an in-progress step replaces the
    /// assignee.
    pub fn assign_step(
        &mut self,
        step_id: &str,
        assignee_id: &str,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let index = self.current_step_checked(step_id)?;
        if assignee_id.trim().is_empty() {
            return Err(CoreError::Validation("assigneeId must not be empty".into()));
        }

        let step = &mut self.steps[index];
        step.assigned_to = Some(assignee_id.to_string());
        step.status = StepStatus::InProgress;
        if self.status == WorkflowStatus::Pending {
            self.status = WorkflowStatus::InProgress;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Complete or fail the current step.
    ///
    /// Manual steps must be assigned first. The actor must hold one of the
    /// step's required roles. A signature must belong to the actor, commit
    /// to this workflow's report, verify, and not already be attached here.
    pub fn complete_step(
        &mut self,
        step_id: &str,
        completion: Completion<'_>,
    ) -> Result<Advance, CoreError> {
        let index = self.current_step_checked(step_id)?;
        let step = &self.steps[index];

        if step.status == StepStatus::Pending && !step.is_automatic() {
            return Err(CoreError::InvalidState(format!(
                "Step '{step_id}' must be assigned before it can be completed"
            )));
        }
        if !completion.actor.holds_any_role(&step.required_role) {
            return Err(CoreError::Forbidden(format!(
                "Completing '{step_id}' requires one of: {}",
                step.required_role.join(", ")
            )));
        }
        if let Some(signature) = &completion.signature {
            self.check_signature(signature, completion.actor)?;
        }

        let step = &mut self.steps[index];
        step.status = match completion.outcome {
            StepOutcome::Completed => StepStatus::Completed,
            StepOutcome::Failed => StepStatus::Failed,
        };
        step.completed_by = Some(completion.actor.user_id.clone());
        step.completed_at = Some(completion.now);
        step.notes = completion.notes;
        step.digital_signature = completion.signature;
        self.updated_at = completion.now;

        let advance = match completion.outcome {
            StepOutcome::Failed => {
                self.status = WorkflowStatus::Rejected;
                self.current_step = None;
                Advance::Rejected
            }
            StepOutcome::Completed => match self.steps.get(index + 1) {
                Some(next) => {
                    let next_id = next.id.clone();
                    self.current_step = Some(next_id.clone());
                    self.status = WorkflowStatus::InProgress;
                    Advance::Next(next_id)
                }
                None => {
                    self.status = WorkflowStatus::Completed;
                    self.current_step = None;
                    Advance::Completed
                }
            },
        };
        Ok(advance)
    }

    /// Cancel a live workflow. Open steps keep their status.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Workflow {} is already {}",
                self.id, self.status
            )));
        }
        self.status = WorkflowStatus::Cancelled;
        self.current_step = None;
        self.updated_at = now;
        Ok(())
    }

    fn check_signature(
        &self,
        signature: &DigitalSignature,
        actor: &ActorContext,
    ) -> Result<(), CoreError> {
        if signature.signer_id != actor.user_id {
            return Err(CoreError::InvalidState(
                "Signature belongs to a different user".into(),
            ));
        }
        if signature.report_id != self.report_id {
            return Err(CoreError::InvalidState(format!(
                "Signature was made for report {}, not {}",
                signature.report_id, self.report_id
            )));
        }
        if !signature.verify() {
            return Err(CoreError::InvalidState(
                "Signature hash does not match its contents".into(),
            ));
        }
        if self
            .attached_signature_hashes()
            .any(|h| h == signature.signature_hash)
        {
            return Err(CoreError::InvalidState(
                "Signature is already attached to another step".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportSnapshot;
    use crate::config::EngineConfig;
    use crate::signature::SignatureMethod;
    use crate::workflow::model::{
        WorkflowPriority, STEP_AUTO_VALIDATION, STEP_DIGITAL_SIGNOFF, STEP_PATHOLOGIST_REVIEW,
    };
    use crate::workflow::planner::plan_steps;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn workflow() -> Workflow {
        let steps = plan_steps(&ReportSnapshot::new("r-1"), &EngineConfig::default());
        Workflow::new("r-1", WorkflowPriority::Routine, steps, Utc::now())
    }

    fn pathologist() -> ActorContext {
        ActorContext::new("dr-path", "Dr Path").with_roles(["pathologist"])
    }

    fn complete<'a>(actor: &'a ActorContext, outcome: StepOutcome) -> Completion<'a> {
        Completion {
            outcome,
            notes: None,
            signature: None,
            actor,
            now: Utc::now(),
        }
    }

    fn signature(report_id: &str, signer_id: &str) -> DigitalSignature {
        let ts = Utc::now();
        DigitalSignature {
            report_id: report_id.into(),
            signer_id: signer_id.into(),
            signer_name: "Dr Path".into(),
            timestamp: ts,
            method: SignatureMethod::Password,
            ip_address: None,
            user_agent: None,
            signature_hash: DigitalSignature::compute_hash(report_id, signer_id, SignatureMethod::Password, ts),
        }
    }

    /// Workflow whose current step is the assigned pathologist review.
    fn at_pathologist_review() -> Workflow {
        let mut wf = workflow();
        let system = ActorContext::system();
        wf.complete_step(STEP_AUTO_VALIDATION, complete(&system, StepOutcome::Completed))
            .unwrap();
        wf.assign_step(STEP_PATHOLOGIST_REVIEW, "dr-path", Utc::now()).unwrap();
        wf
    }

    #[test]
    fn automatic_step_completes_from_pending() {
        let mut wf = workflow();
        let system = ActorContext::system();
        let advance = wf
            .complete_step(STEP_AUTO_VALIDATION, complete(&system, StepOutcome::Completed))
            .unwrap();
        assert_eq!(advance, Advance::Next(STEP_PATHOLOGIST_REVIEW.into()));
        assert_eq!(wf.status, WorkflowStatus::InProgress);
        assert_eq!(wf.steps[0].completed_by.as_deref(), Some("system"));
        assert_eq!(wf.steps[2].status, StepStatus::Pending);
    }

    #[test]
    fn first_assignment_starts_the_workflow() {
        let mut wf = workflow();
        wf.assign_step(STEP_AUTO_VALIDATION, "system", Utc::now()).unwrap();
        assert_eq!(wf.status, WorkflowStatus::InProgress);
        assert_eq!(wf.steps[0].status, StepStatus::InProgress);
        assert_eq!(wf.steps[0].assigned_to.as_deref(), Some("system"));
    }

    #[test]
    fn manual_step_must_be_assigned_before_completion() {
        let mut wf = workflow();
        let system = ActorContext::system();
        wf.complete_step(STEP_AUTO_VALIDATION, complete(&system, StepOutcome::Completed))
            .unwrap();
        let actor = pathologist();
        let err = wf
            .complete_step(STEP_PATHOLOGIST_REVIEW, complete(&actor, StepOutcome::Completed))
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidState(_));
    }

    #[test]
    fn out_of_order_step_is_invalid_state() {
        let mut wf = workflow();
        let err = wf
            .assign_step(STEP_DIGITAL_SIGNOFF, "dr-path", Utc::now())
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidState(_));
        assert_eq!(wf.steps[2].status, StepStatus::Pending);
    }

    #[test]
    fn unknown_step_is_not_found() {
        let mut wf = workflow();
        assert_matches!(
            wf.assign_step("coffee-break", "u", Utc::now()),
            Err(CoreError::NotFound { entity: "Step", .. })
        );
    }

    #[test]
    fn completer_without_required_role_is_forbidden() {
        let mut wf = at_pathologist_review();
        let tech = ActorContext::new("tech", "Tech").with_roles(["lab-technician"]);
        let before = wf.clone();
        let err = wf
            .complete_step(STEP_PATHOLOGIST_REVIEW, complete(&tech, StepOutcome::Completed))
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));
        assert_eq!(wf, before);
    }

    #[test]
    fn failed_outcome_rejects_and_freezes() {
        let mut wf = at_pathologist_review();
        let actor = pathologist();
        let advance = wf
            .complete_step(STEP_PATHOLOGIST_REVIEW, complete(&actor, StepOutcome::Failed))
            .unwrap();
        assert_eq!(advance, Advance::Rejected);
        assert_eq!(wf.status, WorkflowStatus::Rejected);
        assert!(wf.current_step.is_none());
        assert_eq!(wf.steps[1].status, StepStatus::Failed);

        assert_matches!(
            wf.complete_step(STEP_PATHOLOGIST_REVIEW, complete(&actor, StepOutcome::Completed)),
            Err(CoreError::InvalidState(_))
        );
        assert_matches!(wf.cancel(Utc::now()), Err(CoreError::InvalidState(_)));
    }

    #[test]
    fn last_step_completes_the_workflow() {
        let mut wf = at_pathologist_review();
        let actor = pathologist();
        wf.complete_step(STEP_PATHOLOGIST_REVIEW, complete(&actor, StepOutcome::Completed))
            .unwrap();
        wf.assign_step(STEP_DIGITAL_SIGNOFF, "dr-path", Utc::now()).unwrap();
        let advance = wf
            .complete_step(STEP_DIGITAL_SIGNOFF, complete(&actor, StepOutcome::Completed))
            .unwrap();
        assert_eq!(advance, Advance::Completed);
        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert!(wf.current_step.is_none());
    }

    #[test]
    fn completing_twice_is_invalid_state() {
        let mut wf = workflow();
        let system = ActorContext::system();
        wf.complete_step(STEP_AUTO_VALIDATION, complete(&system, StepOutcome::Completed))
            .unwrap();
        assert_matches!(
            wf.complete_step(STEP_AUTO_VALIDATION, complete(&system, StepOutcome::Completed)),
            Err(CoreError::InvalidState(_))
        );
    }

    #[test]
    fn signature_is_checked_and_attached() {
        let mut wf = at_pathologist_review();
        let actor = pathologist();
        let sig = signature("r-1", "dr-path");
        let mut completion = complete(&actor, StepOutcome::Completed);
        completion.signature = Some(sig.clone());
        completion.notes = Some("Agree with findings".into());
        wf.complete_step(STEP_PATHOLOGIST_REVIEW, completion).unwrap();
        assert_eq!(wf.steps[1].digital_signature.as_ref(), Some(&sig));
        assert_eq!(wf.steps[1].notes.as_deref(), Some("Agree with findings"));

        wf.assign_step(STEP_DIGITAL_SIGNOFF, "dr-path", Utc::now()).unwrap();
        let mut reuse = complete(&actor, StepOutcome::Completed);
        reuse.signature = Some(sig);
        assert_matches!(
            wf.complete_step(STEP_DIGITAL_SIGNOFF, reuse),
            Err(CoreError::InvalidState(m)) if m.contains("already attached")
        );
    }

    #[test]
    fn foreign_or_tampered_signatures_are_rejected() {
        let actor = pathologist();

        for (sig, needle) in [
            (signature("r-1", "someone-else"), "different user"),
            (signature("r-2", "dr-path"), "report"),
            (
                DigitalSignature {
                    signature_hash: "0".repeat(64),
                    ..signature("r-1", "dr-path")
                },
                "hash",
            ),
        ] {
            let mut wf = at_pathologist_review();
            let mut completion = complete(&actor, StepOutcome::Completed);
            completion.signature = Some(sig);
            assert_matches!(
                wf.complete_step(STEP_PATHOLOGIST_REVIEW, completion),
                Err(CoreError::InvalidState(m)) if m.contains(needle)
            );
        }
    }

    #[test]
    fn cancel_clears_current_step() {
        let mut wf = workflow();
        wf.cancel(Utc::now()).unwrap();
        assert_eq!(wf.status, WorkflowStatus::Cancelled);
        assert!(wf.current_step.is_none());
    }
}
