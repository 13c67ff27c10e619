//! Rule and result types.

use serde::{Deserialize, Serialize};

/// Completeness of required report fields.
pub const RULE_COMPLETENESS: &str = "completeness-check";
/// Coding entries carry both a system and a code.
pub const RULE_TERMINOLOGY: &str = "terminology-validation";
/// Timestamps parse and the subject reference is well formed.
pub const RULE_FORMAT: &str = "format-validation";
/// Pathology reports carry a conclusion.
pub const RULE_CONCLUSION: &str = "conclusion-present";

/// Message attached to results of rules with no registered evaluator.
pub const NOT_IMPLEMENTED_MESSAGE: &str = "Rule not implemented";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single named check bound to a bot.
///
/// `fhir_path` documents intent only; behaviour comes from the evaluator
/// registered under `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub fhir_path: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub auto_fix: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_action: Option<String>,
}

impl Rule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            fhir_path: String::new(),
            severity,
            message: String::new(),
            auto_fix: false,
            fix_action: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>, fhir_path: impl Into<String>) -> Self {
        self.description = description.into();
        self.fhir_path = fhir_path.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_fix(mut self, fix_action: impl Into<String>) -> Self {
        self.auto_fix = true;
        self.fix_action = Some(fix_action.into());
        self
    }
}

/// Outcome of evaluating one rule against one report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub rule_id: String,
    pub bot_id: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub auto_fixed: bool,
}

impl ValidationResult {
    /// A failed result whose severity would block release.
    pub fn is_unresolved_error(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}

/// Counts reported in the per-run audit fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub result_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub auto_fixed_count: usize,
}

/// Tally failed errors and warnings. Passed results count toward neither.
pub fn summarize(results: &[ValidationResult]) -> ResultSummary {
    let mut summary = ResultSummary {
        result_count: results.len(),
        ..ResultSummary::default()
    };
    for result in results {
        if result.auto_fixed {
            summary.auto_fixed_count += 1;
        }
        if result.passed {
            continue;
        }
        match result.severity {
            Severity::Error => summary.error_count += 1,
            Severity::Warning => summary.warning_count += 1,
            Severity::Info => {}
        }
    }
    summary
}

/// Whether any failed `error`-severity result remains.
pub fn has_unresolved_errors(results: &[ValidationResult]) -> bool {
    results.iter().any(ValidationResult::is_unresolved_error)
}
