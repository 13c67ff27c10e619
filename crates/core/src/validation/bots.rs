//! Bots: triggerable bundles of rules, and the default bot catalogue.

use serde::{Deserialize, Serialize};

use super::fixes::FIX_SET_ISSUED_DATE;
use super::rules::{
    Rule, Severity, RULE_COMPLETENESS, RULE_CONCLUSION, RULE_FORMAT, RULE_TERMINOLOGY,
};
use crate::report::{
    ReportSnapshot, CATEGORY_PATHOLOGY, REPORT_STATUS_PARTIAL, REPORT_STATUS_PRELIMINARY,
    REPORT_STATUS_REGISTERED,
};

// ---------------------------------------------------------------------------
// Trigger conditions
// ---------------------------------------------------------------------------

/// A named predicate over a report.
///
/// Written as strings in bot definitions: `always`, `status:<value>`,
/// `category:<code>`, `has-observations`, `has-code`, `has-conclusion-code`.
/// Anything else parses to [`TriggerCondition::Unknown`] and never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerCondition {
    Always,
    Status(String),
    Category(String),
    HasObservations,
    HasCode,
    HasConclusionCode,
    Unknown(String),
}

impl TriggerCondition {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(status) = raw.strip_prefix("status:") {
            return TriggerCondition::Status(status.to_string());
        }
        if let Some(code) = raw.strip_prefix("category:") {
            return TriggerCondition::Category(code.to_string());
        }
        match raw {
            "always" => TriggerCondition::Always,
            "has-observations" => TriggerCondition::HasObservations,
            "has-code" => TriggerCondition::HasCode,
            "has-conclusion-code" => TriggerCondition::HasConclusionCode,
            other => TriggerCondition::Unknown(other.to_string()),
        }
    }

    pub fn matches(&self, report: &ReportSnapshot) -> bool {
        match self {
            TriggerCondition::Always => true,
            TriggerCondition::Status(status) => report.status_is(status),
            TriggerCondition::Category(code) => report.has_category_code(code),
            TriggerCondition::HasObservations => !report.result.is_empty(),
            TriggerCondition::HasCode => report.code.is_some(),
            TriggerCondition::HasConclusionCode => !report.conclusion_code.is_empty(),
            TriggerCondition::Unknown(_) => false,
        }
    }
}

impl From<String> for TriggerCondition {
    fn from(raw: String) -> Self {
        TriggerCondition::parse(&raw)
    }
}

impl From<TriggerCondition> for String {
    fn from(condition: TriggerCondition) -> Self {
        match condition {
            TriggerCondition::Always => "always".into(),
            TriggerCondition::Status(s) => format!("status:{s}"),
            TriggerCondition::Category(c) => format!("category:{c}"),
            TriggerCondition::HasObservations => "has-observations".into(),
            TriggerCondition::HasCode => "has-code".into(),
            TriggerCondition::HasConclusionCode => "has-conclusion-code".into(),
            TriggerCondition::Unknown(raw) => raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger_conditions: Vec<TriggerCondition>,
    pub validation_rules: Vec<Rule>,
    pub is_active: bool,
    /// Execution order only; lower runs first.
    pub priority: i32,
}

impl Bot {
    /// Active and at least one trigger condition matches.
    pub fn applies_to(&self, report: &ReportSnapshot) -> bool {
        self.is_active && self.trigger_conditions.iter().any(|c| c.matches(report))
    }
}

fn triggers(raw: &[&str]) -> Vec<TriggerCondition> {
    raw.iter().map(|r| TriggerCondition::parse(r)).collect()
}

/// The bots shipped with the engine.
pub fn default_bots() -> Vec<Bot> {
    vec![
        Bot {
            id: "completeness-bot".into(),
            name: "Completeness Bot".into(),
            description: "Checks that every report carries the fields required for release".into(),
            trigger_conditions: triggers(&["always"]),
            validation_rules: vec![Rule::new(RULE_COMPLETENESS, "Required fields", Severity::Error)
                .described(
                    "Report must have status, code, subject, effective and issued times",
                    "DiagnosticReport.status.exists() and DiagnosticReport.code.exists() and \
                     DiagnosticReport.subject.exists() and DiagnosticReport.effective.exists() and \
                     DiagnosticReport.issued.exists()",
                )
                .with_message("Report is missing required fields")
                .with_fix(FIX_SET_ISSUED_DATE)],
            is_active: true,
            priority: 10,
        },
        Bot {
            id: "terminology-bot".into(),
            name: "Terminology Bot".into(),
            description: "Checks that report and conclusion codings are fully qualified".into(),
            trigger_conditions: triggers(&["has-code", "has-conclusion-code"]),
            validation_rules: vec![Rule::new(RULE_TERMINOLOGY, "Coding integrity", Severity::Error)
                .described(
                    "Every coding must carry both a system and a code",
                    "DiagnosticReport.code.coding.all(system.exists() and code.exists())",
                )
                .with_message("Report contains incomplete codings")],
            is_active: true,
            priority: 20,
        },
        Bot {
            id: "format-bot".into(),
            name: "Format Bot".into(),
            description: "Checks timestamp and reference formats".into(),
            trigger_conditions: vec![
                TriggerCondition::Status(REPORT_STATUS_REGISTERED.into()),
                TriggerCondition::Status(REPORT_STATUS_PARTIAL.into()),
                TriggerCondition::Status(REPORT_STATUS_PRELIMINARY.into()),
                TriggerCondition::HasObservations,
            ],
            validation_rules: vec![Rule::new(RULE_FORMAT, "Field formats", Severity::Error)
                .described(
                    "Timestamps must parse and the subject must reference <Type>/<id>",
                    "DiagnosticReport.subject.reference.matches('^[A-Z][A-Za-z]+/[A-Za-z0-9\\\\-\\\\.]{1,64}$')",
                )
                .with_message("Report contains malformed fields")],
            is_active: true,
            priority: 30,
        },
        Bot {
            id: "pathology-bot".into(),
            name: "Pathology Bot".into(),
            description: "Extra checks for anatomic pathology reports".into(),
            trigger_conditions: vec![TriggerCondition::Category(CATEGORY_PATHOLOGY.into())],
            validation_rules: vec![Rule::new(RULE_CONCLUSION, "Conclusion present", Severity::Warning)
                .described(
                    "Pathology reports should state a conclusion",
                    "DiagnosticReport.conclusion.exists() or DiagnosticReport.conclusionCode.exists()",
                )
                .with_message("Pathology report has no conclusion")],
            is_active: true,
            priority: 40,
        },
    ]
}
