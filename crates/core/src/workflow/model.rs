//! Workflow and step types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::signature::DigitalSignature;
use crate::types::{Timestamp, WorkflowId};

// ---------------------------------------------------------------------------
// Step ids
// ---------------------------------------------------------------------------

/// Automatic bot validation, always first.
pub const STEP_AUTO_VALIDATION: &str = "auto-validation";
/// Manual technical review, only planned for complex reports.
pub const STEP_TECHNICAL_REVIEW: &str = "technical-review";
/// Specialist review, always planned.
pub const STEP_PATHOLOGIST_REVIEW: &str = "pathologist-review";
/// Final sign-off, always last.
pub const STEP_DIGITAL_SIGNOFF: &str = "digital-signoff";

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPriority {
    #[default]
    Routine,
    Urgent,
    Stat,
}

impl WorkflowPriority {
    pub const ALL: &'static [&'static str] = &["routine", "urgent", "stat"];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowPriority::Routine => "routine",
            WorkflowPriority::Urgent => "urgent",
            WorkflowPriority::Stat => "stat",
        }
    }
}

impl FromStr for WorkflowPriority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routine" => Ok(WorkflowPriority::Routine),
            "urgent" => Ok(WorkflowPriority::Urgent),
            "stat" => Ok(WorkflowPriority::Stat),
            other => Err(CoreError::Validation(format!(
                "Invalid priority '{other}'. Must be one of: {}",
                Self::ALL.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::InProgress => "in-progress",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Rejected => "rejected",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, rejected and cancelled workflows accept no transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Rejected | WorkflowStatus::Cancelled
        )
    }

    /// Statuses reachable from `self`.
    ///
    /// - `pending`     -> `in-progress`, `completed`, `rejected`, `cancelled`
    /// - `in-progress` -> `completed`, `rejected`, `cancelled`
    /// - terminal      -> nothing
    ///
    /// `pending` may jump straight to `completed`/`rejected` when the
    /// automatic step is the only step completed before any assignment.
    pub fn valid_transitions(self) -> &'static [WorkflowStatus] {
        use WorkflowStatus::*;
        match self {
            Pending => &[InProgress, Completed, Rejected, Cancelled],
            InProgress => &[Completed, Rejected, Cancelled],
            Completed | Rejected | Cancelled => &[],
        }
    }

    pub fn can_transition(self, to: WorkflowStatus) -> bool {
        (self == to && !self.is_terminal()) || self.valid_transitions().contains(&to)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in-progress",
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        }
    }

    /// Pending or in progress.
    pub fn is_open(self) -> bool {
        matches!(self, StepStatus::Pending | StepStatus::InProgress)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationType {
    Automatic,
    Manual,
    PeerReview,
}

/// What the completer decided about a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Completed,
    Failed,
}

impl StepOutcome {
    pub const ALL: &'static [&'static str] = &["completed", "failed"];

    pub fn as_str(self) -> &'static str {
        match self {
            StepOutcome::Completed => "completed",
            StepOutcome::Failed => "failed",
        }
    }
}

impl FromStr for StepOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(StepOutcome::Completed),
            "failed" => Ok(StepOutcome::Failed),
            other => Err(CoreError::Validation(format!(
                "Invalid outcome '{other}'. Must be one of: {}",
                Self::ALL.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    /// 1-based and contiguous within a workflow.
    pub order: u32,
    pub name: String,
    pub description: String,
    /// The completer must hold at least one of these.
    pub required_role: Vec<String>,
    pub validation_type: ValidationType,
    /// Informational; the bot engine decides what actually runs.
    pub validation_rules: Vec<String>,
    pub status: StepStatus,
    pub assigned_to: Option<String>,
    pub completed_by: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub notes: Option<String>,
    pub digital_signature: Option<DigitalSignature>,
}

impl Step {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        validation_type: ValidationType,
        required_role: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            order: 0,
            name: name.into(),
            description: description.into(),
            required_role: required_role.iter().map(|r| r.to_string()).collect(),
            validation_type,
            validation_rules: Vec::new(),
            status: StepStatus::Pending,
            assigned_to: None,
            completed_by: None,
            completed_at: None,
            notes: None,
            digital_signature: None,
        }
    }

    pub fn with_rules(mut self, rule_ids: &[&str]) -> Self {
        self.validation_rules = rule_ids.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn is_automatic(&self) -> bool {
        self.validation_type == ValidationType::Automatic
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub report_id: String,
    pub steps: Vec<Step>,
    /// Lowest-order open step; `None` once the workflow is terminal.
    pub current_step: Option<String>,
    pub priority: WorkflowPriority,
    pub status: WorkflowStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Incremented by the repository on every committed save.
    pub version: u64,
}

impl Workflow {
    /// A pending workflow over `steps`, renumbered `1..=n` in the given order.
    pub fn new(
        report_id: impl Into<String>,
        priority: WorkflowPriority,
        mut steps: Vec<Step>,
        now: Timestamp,
    ) -> Self {
        for (i, step) in steps.iter_mut().enumerate() {
            step.order = i as u32 + 1;
        }
        let current_step = steps.first().map(|s| s.id.clone());
        Self {
            id: uuid::Uuid::now_v7(),
            report_id: report_id.into(),
            steps,
            current_step,
            priority,
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn current(&self) -> Option<&Step> {
        self.current_step.as_deref().and_then(|id| self.step(id))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// Hashes of every signature attached to a step of this workflow.
    pub fn attached_signature_hashes(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter_map(|s| s.digital_signature.as_ref())
            .map(|sig| sig.signature_hash.as_str())
    }
}
