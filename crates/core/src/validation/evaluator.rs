//! Rule evaluators and the registry that binds them to rule ids.
//!
//! Evaluators are pure: they read a report and return a [`Verdict`]. The
//! engine decides what to do with a failure (auto-fix, severity, audit).

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::json;

use super::rules::{
    NOT_IMPLEMENTED_MESSAGE, RULE_COMPLETENESS, RULE_CONCLUSION, RULE_FORMAT, RULE_TERMINOLOGY,
};
use crate::report::{parse_timestamp, CodeableConcept, ReportSnapshot};

/// `<ResourceType>/<id>` where the id is 1-64 alphanumerics, dots or dashes.
static SUBJECT_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Za-z]+/[A-Za-z0-9\-.]{1,64}$").expect("valid regex")
});

/// An evaluator could not reach a verdict.
#[derive(Debug, thiserror::Error)]
#[error("rule evaluation failed: {0}")]
pub struct RuleEvaluationError(pub String);

/// Pass/fail outcome of a single evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details),
        }
    }
}

pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError>;
}

impl<F> RuleEvaluator for F
where
    F: Fn(&ReportSnapshot) -> Result<Verdict, RuleEvaluationError> + Send + Sync,
{
    fn evaluate(&self, report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError> {
        self(report)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps rule ids to evaluators. Ids without an entry resolve to an inert
/// evaluator that always passes with [`NOT_IMPLEMENTED_MESSAGE`].
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<String, Arc<dyn RuleEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in evaluator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(RULE_COMPLETENESS, evaluate_completeness);
        registry.register(RULE_TERMINOLOGY, evaluate_terminology);
        registry.register(RULE_FORMAT, evaluate_format);
        registry.register(RULE_CONCLUSION, evaluate_conclusion);
        registry
    }

    pub fn register(&mut self, rule_id: impl Into<String>, evaluator: impl RuleEvaluator + 'static) {
        self.evaluators.insert(rule_id.into(), Arc::new(evaluator));
    }

    pub fn is_registered(&self, rule_id: &str) -> bool {
        self.evaluators.contains_key(rule_id)
    }

    pub fn resolve(&self, rule_id: &str) -> Arc<dyn RuleEvaluator> {
        match self.evaluators.get(rule_id) {
            Some(evaluator) => Arc::clone(evaluator),
            None => Arc::new(not_implemented) as Arc<dyn RuleEvaluator>,
        }
    }
}

fn not_implemented(_report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError> {
    Ok(Verdict::pass(NOT_IMPLEMENTED_MESSAGE))
}

// ---------------------------------------------------------------------------
// Built-in evaluators
// ---------------------------------------------------------------------------

/// Fails when any required field is absent; the message names all of them.
pub fn evaluate_completeness(report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError> {
    let missing = report.missing_required_fields();
    if missing.is_empty() {
        return Ok(Verdict::pass("All required fields are present"));
    }
    Ok(Verdict::fail(
        format!("Missing required fields: {}", missing.join(", ")),
        json!({ "missingFields": missing }),
    ))
}

/// Fails when the primary code or any conclusion code has a coding without
/// both `system` and `code`. All issues are aggregated.
pub fn evaluate_terminology(report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError> {
    let mut issues = Vec::new();
    if let Some(code) = &report.code {
        collect_coding_issues("code", code, &mut issues);
    }
    for (i, concept) in report.conclusion_code.iter().enumerate() {
        collect_coding_issues(&format!("conclusionCode[{i}]"), concept, &mut issues);
    }

    if issues.is_empty() {
        return Ok(Verdict::pass("All codings are complete"));
    }
    Ok(Verdict::fail(
        format!("Terminology issues: {}", issues.join("; ")),
        json!({ "issues": issues }),
    ))
}

fn collect_coding_issues(path: &str, concept: &CodeableConcept, issues: &mut Vec<String>) {
    for (i, coding) in concept.coding.iter().enumerate() {
        if coding.is_complete() {
            continue;
        }
        let mut lacking = Vec::new();
        if coding.system.as_deref().map_or(true, |s| s.trim().is_empty()) {
            lacking.push("system");
        }
        if coding.code.as_deref().map_or(true, |c| c.trim().is_empty()) {
            lacking.push("code");
        }
        issues.push(format!("{path}.coding[{i}] missing {}", lacking.join(" and ")));
    }
}

/// Fails when a present timestamp does not parse or a present subject
/// reference is malformed. Absent fields are left to the completeness check.
pub fn evaluate_format(report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError> {
    let mut issues = Vec::new();

    for (field, value) in [
        ("effectiveDateTime", report.effective_date_time.as_deref()),
        ("issued", report.issued.as_deref()),
    ] {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            if parse_timestamp(value).is_none() {
                issues.push(format!("{field} '{value}' is not a valid timestamp"));
            }
        }
    }

    if let Some(reference) = report.subject_reference() {
        if !SUBJECT_REFERENCE_RE.is_match(reference) {
            issues.push(format!(
                "subject.reference '{reference}' does not match <ResourceType>/<id>"
            ));
        }
    }

    if issues.is_empty() {
        return Ok(Verdict::pass("All field formats are valid"));
    }
    Ok(Verdict::fail(
        format!("Format issues: {}", issues.join("; ")),
        json!({ "issues": issues }),
    ))
}

/// Fails when a report has neither conclusion text nor a conclusion code.
pub fn evaluate_conclusion(report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError> {
    let has_text = report
        .conclusion
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if has_text || !report.conclusion_code.is_empty() {
        return Ok(Verdict::pass("Conclusion is present"));
    }
    Ok(Verdict::fail(
        "Report has neither a conclusion nor a conclusion code",
        json!({ "fields": ["conclusion", "conclusionCode"] }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Coding, Reference};

    fn complete_report() -> ReportSnapshot {
        let mut report = ReportSnapshot::new("r-1");
        report.status = Some("preliminary".into());
        report.code = Some(CodeableConcept::coded("http://loinc.org", "60567-5"));
        report.subject = Some(Reference::to("Patient/p-1"));
        report.effective_date_time = Some("2024-03-01T10:00:00Z".into());
        report.issued = Some("2024-03-01T12:00:00Z".into());
        report
    }

    #[test]
    fn completeness_passes_for_complete_report() {
        let verdict = evaluate_completeness(&complete_report()).unwrap();
        assert!(verdict.passed);
    }

    #[test]
    fn completeness_names_every_missing_field() {
        let mut report = complete_report();
        report.code = None;
        report.effective_date_time = None;
        let verdict = evaluate_completeness(&report).unwrap();
        assert!(!verdict.passed);
        assert!(verdict.message.contains("code"));
        assert!(verdict.message.contains("effectiveDateTime"));
        assert!(!verdict.message.contains("subject"));
    }

    #[test]
    fn terminology_flags_coding_without_system() {
        let mut report = complete_report();
        report.code = Some(CodeableConcept {
            coding: vec![Coding {
                system: None,
                code: Some("60567-5".into()),
                display: None,
            }],
            text: None,
        });
        let verdict = evaluate_terminology(&report).unwrap();
        assert!(!verdict.passed);
        assert!(verdict.message.contains("code.coding[0] missing system"));
    }

    #[test]
    fn terminology_aggregates_conclusion_code_issues() {
        let mut report = complete_report();
        report.conclusion_code = vec![
            CodeableConcept::coded("http://snomed.info/sct", "1234"),
            CodeableConcept {
                coding: vec![Coding::default()],
                text: None,
            },
            CodeableConcept {
                coding: vec![Coding {
                    system: Some("http://snomed.info/sct".into()),
                    code: None,
                    display: None,
                }],
                text: None,
            },
        ];
        let verdict = evaluate_terminology(&report).unwrap();
        assert!(!verdict.passed);
        assert!(verdict.message.contains("conclusionCode[1].coding[0] missing system and code"));
        assert!(verdict.message.contains("conclusionCode[2].coding[0] missing code"));
        assert_eq!(verdict.details.unwrap()["issues"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn format_rejects_unparseable_issued() {
        let mut report = complete_report();
        report.issued = Some("last tuesday".into());
        let verdict = evaluate_format(&report).unwrap();
        assert!(!verdict.passed);
        assert!(verdict.message.contains("issued"));
    }

    #[test]
    fn format_rejects_bad_subject_reference() {
        let mut report = complete_report();
        report.subject = Some(Reference::to("patient-without-type"));
        let verdict = evaluate_format(&report).unwrap();
        assert!(!verdict.passed);
        assert!(verdict.message.contains("subject.reference"));
    }

    #[test]
    fn format_rejects_overlong_subject_id() {
        let mut report = complete_report();
        report.subject = Some(Reference::to(format!("Patient/{}", "a".repeat(65))));
        assert!(!evaluate_format(&report).unwrap().passed);

        report.subject = Some(Reference::to(format!("Patient/{}", "a".repeat(64))));
        assert!(evaluate_format(&report).unwrap().passed);
    }

    #[test]
    fn format_ignores_absent_fields() {
        let report = ReportSnapshot::new("r-empty");
        assert!(evaluate_format(&report).unwrap().passed);
    }

    #[test]
    fn conclusion_accepts_text_or_codes() {
        let mut report = complete_report();
        assert!(!evaluate_conclusion(&report).unwrap().passed);
        report.conclusion = Some("Benign".into());
        assert!(evaluate_conclusion(&report).unwrap().passed);
    }

    #[test]
    fn unregistered_rule_resolves_to_inert_pass() {
        let registry = EvaluatorRegistry::with_defaults();
        assert!(!registry.is_registered("critical-value-check"));
        let verdict = registry
            .resolve("critical-value-check")
            .evaluate(&ReportSnapshot::new("r"))
            .unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.message, NOT_IMPLEMENTED_MESSAGE);
    }

    #[test]
    fn closures_can_be_registered() {
        let mut registry = EvaluatorRegistry::empty();
        registry.register("always-fails", |_: &ReportSnapshot| -> Result<Verdict, RuleEvaluationError> {
            Ok(Verdict::fail("nope", json!({})))
        });
        let verdict = registry
            .resolve("always-fails")
            .evaluate(&ReportSnapshot::new("r"))
            .unwrap();
        assert!(!verdict.passed);
    }
}
