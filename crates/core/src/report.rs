//! Read-only view of a diagnostic report, shaped after the FHIR
//! `DiagnosticReport` resource.
//!
//! Only the fields the engine reasons about are modelled; unknown JSON
//! fields are ignored on deserialization.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Report status constants
// ---------------------------------------------------------------------------

pub const REPORT_STATUS_REGISTERED: &str = "registered";
pub const REPORT_STATUS_PARTIAL: &str = "partial";
pub const REPORT_STATUS_PRELIMINARY: &str = "preliminary";
pub const REPORT_STATUS_FINAL: &str = "final";

/// Category code for anatomic pathology reports.
pub const CATEGORY_PATHOLOGY: &str = "PAT";

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            display: None,
        }
    }

    /// A coding is complete when both `system` and `code` are non-empty.
    pub fn is_complete(&self) -> bool {
        non_empty(&self.system) && non_empty(&self.code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn coded(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            coding: vec![Coding::new(system, code)],
            text: None,
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.coding.iter().any(|c| c.code.as_deref() == Some(code))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn to(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            display: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ReportSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Vec<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<String>,
    #[serde(default)]
    pub result: Vec<Reference>,
    #[serde(default)]
    pub conclusion_code: Vec<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
}

impl ReportSnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn status_is(&self, status: &str) -> bool {
        self.status.as_deref() == Some(status)
    }

    pub fn is_final(&self) -> bool {
        self.status_is(REPORT_STATUS_FINAL)
    }

    pub fn has_category_code(&self, code: &str) -> bool {
        self.category.iter().any(|c| c.has_code(code))
    }

    pub fn subject_reference(&self) -> Option<&str> {
        self.subject.as_ref().and_then(|s| s.reference.as_deref())
    }

    /// Names of required fields that are absent or empty, in a fixed order.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !non_empty(&self.status) {
            missing.push("status");
        }
        if self.code.is_none() {
            missing.push("code");
        }
        if self.subject.is_none() {
            missing.push("subject");
        }
        if !non_empty(&self.effective_date_time) {
            missing.push("effectiveDateTime");
        }
        if !non_empty(&self.issued) {
            missing.push("issued");
        }
        missing
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Parse a FHIR `dateTime`/`instant` value.
///
/// Accepts RFC 3339 timestamps, zone-less date-times (taken as UTC) and bare
/// dates (midnight UTC). Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a timestamp the way auto-fixes write it back into a report.
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
