//! Auto-fix remediations, keyed by the `fix_action` a rule declares.
//!
//! A fix returns `true` only when it changed the report. A fix that finds
//! nothing to change (the field is already present) returns `false` and the
//! rule's failure stands.

use std::collections::HashMap;
use std::sync::Arc;

use crate::report::{format_timestamp, ReportSnapshot};
use crate::types::Timestamp;

/// Set `issued` to the current time when it is absent.
pub const FIX_SET_ISSUED_DATE: &str = "set-issued-date";

pub trait FixAction: Send + Sync {
    fn apply(&self, report: &mut ReportSnapshot, now: Timestamp) -> bool;
}

impl<F> FixAction for F
where
    F: Fn(&mut ReportSnapshot, Timestamp) -> bool + Send + Sync,
{
    fn apply(&self, report: &mut ReportSnapshot, now: Timestamp) -> bool {
        self(report, now)
    }
}

#[derive(Clone, Default)]
pub struct FixRegistry {
    fixes: HashMap<String, Arc<dyn FixAction>>,
}

impl FixRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(FIX_SET_ISSUED_DATE, set_issued_date);
        registry
    }

    pub fn register(&mut self, fix_action: impl Into<String>, fix: impl FixAction + 'static) {
        self.fixes.insert(fix_action.into(), Arc::new(fix));
    }

    /// `None` for unrecognised fix actions.
    pub fn get(&self, fix_action: &str) -> Option<Arc<dyn FixAction>> {
        self.fixes.get(fix_action).cloned()
    }
}

pub fn set_issued_date(report: &mut ReportSnapshot, now: Timestamp) -> bool {
    let present = report
        .issued
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty());
    if present {
        return false;
    }
    report.issued = Some(format_timestamp(now));
    true
}
