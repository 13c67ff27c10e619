//! Bot validation engine.
//!
//! Selects the active bots whose trigger conditions match a report, runs
//! every bound rule through the evaluator registry, applies declared
//! auto-fixes, and emits one audit fact per run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::bots::{default_bots, Bot};
use super::evaluator::{EvaluatorRegistry, RuleEvaluationError, RuleEvaluator, Verdict};
use super::fixes::FixRegistry;
use super::rules::{summarize, ResultSummary, Rule, Severity, ValidationResult};
use crate::audit::{self, actions, resource_types, AuditFact, AuditSink};
use crate::report::ReportSnapshot;
use crate::types::Timestamp;

/// Everything one engine run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotRun {
    /// Ids of the bots that ran, in execution order.
    pub bots_run: Vec<String>,
    /// One entry per evaluated rule, ordered by bot then rule declaration.
    pub results: Vec<ValidationResult>,
    /// Whether any auto-fix changed the report.
    pub report_modified: bool,
    pub summary: ResultSummary,
}

pub struct BotEngine {
    /// Sorted by `(priority, id)`.
    bots: Vec<Bot>,
    evaluators: EvaluatorRegistry,
    fixes: FixRegistry,
    audit: Arc<dyn AuditSink>,
}

impl BotEngine {
    pub fn new(
        mut bots: Vec<Bot>,
        evaluators: EvaluatorRegistry,
        fixes: FixRegistry,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        bots.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Self {
            bots,
            evaluators,
            fixes,
            audit,
        }
    }

    /// Engine with the default bots, evaluators and fixes.
    pub fn with_defaults(audit: Arc<dyn AuditSink>) -> Self {
        Self::new(
            default_bots(),
            EvaluatorRegistry::with_defaults(),
            FixRegistry::with_defaults(),
            audit,
        )
    }

    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    /// Run every triggered bot against `report` and return the results.
    ///
    /// Auto-fixes are applied to `report` in place.
    pub async fn execute(&self, report: &mut ReportSnapshot) -> Vec<ValidationResult> {
        self.run(report).await.results
    }

    /// Like [`execute`](Self::execute) but returns the full [`BotRun`].
    pub async fn run(&self, report: &mut ReportSnapshot) -> BotRun {
        let run = self.evaluate(report, Utc::now());

        tracing::info!(
            report_id = %report.id,
            bot_count = run.bots_run.len(),
            result_count = run.summary.result_count,
            error_count = run.summary.error_count,
            warning_count = run.summary.warning_count,
            auto_fixed = run.summary.auto_fixed_count,
            "Bot validation finished"
        );

        let fact = AuditFact::new(actions::BOT_VALIDATION, resource_types::REPORT, &report.id)
            .with_details(json!({
                "botCount": run.bots_run.len(),
                "bots": run.bots_run,
                "resultCount": run.summary.result_count,
                "errorCount": run.summary.error_count,
                "warningCount": run.summary.warning_count,
                "autoFixedCount": run.summary.auto_fixed_count,
            }));
        audit::emit(self.audit.as_ref(), fact).await;

        run
    }

    /// Synchronous core of [`run`](Self::run); emits nothing.
    ///
    /// Bot selection is decided against the report as it was passed in, so
    /// fixes applied by an earlier bot never change which bots run.
    pub fn evaluate(&self, report: &mut ReportSnapshot, now: Timestamp) -> BotRun {
        let selected: Vec<&Bot> = self.bots.iter().filter(|b| b.applies_to(report)).collect();
        tracing::debug!(
            report_id = %report.id,
            selected = ?selected.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            "Selected bots"
        );

        let mut results = Vec::new();
        let mut report_modified = false;
        for bot in &selected {
            for rule in &bot.validation_rules {
                let (result, modified) = self.evaluate_rule(bot, rule, report, now);
                report_modified |= modified;
                results.push(result);
            }
        }

        let summary = summarize(&results);
        BotRun {
            bots_run: selected.iter().map(|b| b.id.clone()).collect(),
            results,
            report_modified,
            summary,
        }
    }

    fn evaluate_rule(
        &self,
        bot: &Bot,
        rule: &Rule,
        report: &mut ReportSnapshot,
        now: Timestamp,
    ) -> (ValidationResult, bool) {
        let evaluator = self.evaluators.resolve(&rule.id);
        let verdict = match invoke(evaluator.as_ref(), report) {
            Ok(verdict) => verdict,
            Err(e) => return (evaluation_error(bot, rule, &e), false),
        };
        if verdict.passed || !rule.auto_fix {
            return (from_verdict(bot, rule, verdict, false), false);
        }

        let Some(fix_action) = rule.fix_action.as_deref() else {
            return (from_verdict(bot, rule, verdict, false), false);
        };
        let Some(fix) = self.fixes.get(fix_action) else {
            tracing::debug!(rule_id = %rule.id, fix_action, "Unrecognised fix action, skipping");
            return (from_verdict(bot, rule, verdict, false), false);
        };
        if !fix.apply(report, now) {
            return (from_verdict(bot, rule, verdict, false), false);
        }

        tracing::debug!(report_id = %report.id, rule_id = %rule.id, fix_action, "Applied auto-fix");
        match invoke(evaluator.as_ref(), report) {
            Ok(after) if after.passed => {
                let fixed = Verdict {
                    passed: true,
                    message: format!("Auto-fixed ({fix_action}): {}", after.message),
                    details: Some(json!({ "fixAction": fix_action, "originalMessage": verdict.message })),
                };
                (from_verdict(bot, rule, fixed, true), true)
            }
            Ok(after) => (from_verdict(bot, rule, after, false), true),
            Err(e) => (evaluation_error(bot, rule, &e), true),
        }
    }
}

/// Call an evaluator, turning a panic into an evaluation error.
fn invoke(evaluator: &dyn RuleEvaluator, report: &ReportSnapshot) -> Result<Verdict, RuleEvaluationError> {
    match catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(report))) {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "evaluator panicked".to_string());
            Err(RuleEvaluationError(message))
        }
    }
}

fn from_verdict(bot: &Bot, rule: &Rule, verdict: Verdict, auto_fixed: bool) -> ValidationResult {
    ValidationResult {
        rule_id: rule.id.clone(),
        bot_id: bot.id.clone(),
        passed: verdict.passed,
        severity: rule.severity,
        message: verdict.message,
        details: verdict.details,
        auto_fixed,
    }
}

fn evaluation_error(bot: &Bot, rule: &Rule, error: &RuleEvaluationError) -> ValidationResult {
    tracing::warn!(bot_id = %bot.id, rule_id = %rule.id, error = %error, "Rule evaluator failed");
    ValidationResult {
        rule_id: rule.id.clone(),
        bot_id: bot.id.clone(),
        passed: false,
        severity: Severity::Error,
        message: error.to_string(),
        details: Some(json!({ "evaluationError": true })),
        auto_fixed: false,
    }
}
