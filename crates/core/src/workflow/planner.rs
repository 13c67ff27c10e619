//! Step planning.
//!
//! Every report gets auto-validation, pathologist review and sign-off.
//! Complex reports get a technical review between the first two.

use crate::config::EngineConfig;
use crate::report::{ReportSnapshot, CATEGORY_PATHOLOGY};
use crate::roles::{ROLE_LAB_MANAGER, ROLE_LAB_TECHNICIAN, ROLE_PATHOLOGIST, ROLE_SYSTEM};
use crate::validation::rules::{RULE_COMPLETENESS, RULE_FORMAT, RULE_TERMINOLOGY};

use super::model::{
    Step, ValidationType, STEP_AUTO_VALIDATION, STEP_DIGITAL_SIGNOFF, STEP_PATHOLOGIST_REVIEW,
    STEP_TECHNICAL_REVIEW,
};

/// More results or conclusion codes than the configured thresholds, or a
/// pathology category.
pub fn is_complex(report: &ReportSnapshot, config: &EngineConfig) -> bool {
    report.result.len() > config.complex_result_threshold
        || report.has_category_code(CATEGORY_PATHOLOGY)
        || report.conclusion_code.len() > config.complex_conclusion_threshold
}

/// Ordered, all-pending steps for `report`, numbered from 1.
pub fn plan_steps(report: &ReportSnapshot, config: &EngineConfig) -> Vec<Step> {
    let mut steps = vec![Step::new(
        STEP_AUTO_VALIDATION,
        "Automatic Validation",
        "Bots check completeness, terminology and formats",
        ValidationType::Automatic,
        &[ROLE_SYSTEM],
    )
    .with_rules(&[RULE_COMPLETENESS, RULE_TERMINOLOGY, RULE_FORMAT])];

    if is_complex(report, config) {
        steps.push(Step::new(
            STEP_TECHNICAL_REVIEW,
            "Technical Review",
            "Laboratory staff review results of a complex report",
            ValidationType::Manual,
            &[ROLE_LAB_TECHNICIAN, ROLE_LAB_MANAGER],
        ));
    }

    steps.push(Step::new(
        STEP_PATHOLOGIST_REVIEW,
        "Pathologist Review",
        "Medical review of findings and conclusion",
        ValidationType::Manual,
        &[ROLE_PATHOLOGIST],
    ));
    steps.push(Step::new(
        STEP_DIGITAL_SIGNOFF,
        "Digital Sign-off",
        "Pathologist signs the report for release",
        ValidationType::Manual,
        &[ROLE_PATHOLOGIST],
    ));
    for (i, step) in steps.iter_mut().enumerate() {
        step.order = i as u32 + 1;
    }

    tracing::debug!(
        report_id = %report.id,
        step_count = steps.len(),
        "Planned validation steps"
    );
    steps
}
