//! Engine tuning knobs.
//!
//! The core crate never reads the environment itself; the API binary builds
//! an [`EngineConfig`] from its own configuration and hands it in.

/// Result-count threshold above which a report is considered complex.
pub const DEFAULT_COMPLEX_RESULT_THRESHOLD: usize = 10;

/// Conclusion-code-count threshold above which a report is considered complex.
pub const DEFAULT_COMPLEX_CONCLUSION_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reject assignments whose assignee holds none of the step's required
    /// roles. Off by default: roles are otherwise only checked when the step
    /// is completed.
    pub enforce_assignment_roles: bool,
    /// A report with more than this many `result` entries gets a technical
    /// review step.
    pub complex_result_threshold: usize,
    /// A report with more than this many `conclusionCode` entries gets a
    /// technical review step.
    pub complex_conclusion_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enforce_assignment_roles: false,
            complex_result_threshold: DEFAULT_COMPLEX_RESULT_THRESHOLD,
            complex_conclusion_threshold: DEFAULT_COMPLEX_CONCLUSION_THRESHOLD,
        }
    }
}
