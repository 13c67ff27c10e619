//! Per-report validation workflows.
//!
//! [`planner`] builds the steps, [`machine`] holds the transitions,
//! [`repository`] stores workflows and [`service`] orchestrates them.

pub mod machine;
pub mod model;
pub mod planner;
pub mod repository;
pub mod service;

pub use model::{
    Step, StepOutcome, StepStatus, ValidationType, Workflow, WorkflowPriority, WorkflowStatus,
};
pub use repository::{MemoryWorkflowRepository, WorkflowRepository};
pub use service::{AutoValidation, CompleteStep, ValidationPreview, WorkflowEngine};
