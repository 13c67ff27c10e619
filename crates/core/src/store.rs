//! Report store collaborator.
//!
//! The clinical-record store is external; the engine only needs to read a
//! snapshot, persist auto-fixes, and flip the status on finalization.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::report::ReportSnapshot;

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Fetch a report snapshot. Missing reports are `CoreError::NotFound`.
    async fn read_report(&self, report_id: &str) -> Result<ReportSnapshot, CoreError>;

    /// Replace the stored report with `report` (used to persist auto-fixes).
    async fn save_report(&self, report: &ReportSnapshot) -> Result<(), CoreError>;

    /// Set the report's `status` field.
    async fn update_report_status(&self, report_id: &str, status: &str) -> Result<(), CoreError>;
}

/// In-process report store keyed by report id.
#[derive(Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<String, ReportSnapshot>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a report.
    pub async fn put(&self, report: ReportSnapshot) {
        self.reports
            .write()
            .await
            .insert(report.id.clone(), report);
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn read_report(&self, report_id: &str) -> Result<ReportSnapshot, CoreError> {
        self.reports
            .read()
            .await
            .get(report_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Report", report_id))
    }

    async fn save_report(&self, report: &ReportSnapshot) -> Result<(), CoreError> {
        let mut reports = self.reports.write().await;
        if !reports.contains_key(&report.id) {
            return Err(CoreError::not_found("Report", &report.id));
        }
        reports.insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn update_report_status(&self, report_id: &str, status: &str) -> Result<(), CoreError> {
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(report_id)
            .ok_or_else(|| CoreError::not_found("Report", report_id))?;
        report.status = Some(status.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn put_then_read_returns_snapshot() {
        let store = MemoryReportStore::new();
        store.put(ReportSnapshot::new("r-1")).await;
        let report = store.read_report("r-1").await.unwrap();
        assert_eq!(report.id, "r-1");
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let store = MemoryReportStore::new();
        let err = store.read_report("nope").await.unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Report", .. });
    }

    #[tokio::test]
    async fn update_status_changes_only_status() {
        let store = MemoryReportStore::new();
        let mut report = ReportSnapshot::new("r-1");
        report.conclusion = Some("benign".into());
        store.put(report).await;

        store.update_report_status("r-1", "final").await.unwrap();
        let updated = store.read_report("r-1").await.unwrap();
        assert_eq!(updated.status.as_deref(), Some("final"));
        assert_eq!(updated.conclusion.as_deref(), Some("benign"));
    }

    #[tokio::test]
    async fn save_unknown_report_is_not_found() {
        let store = MemoryReportStore::new();
        let err = store.save_report(&ReportSnapshot::new("ghost")).await.unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }
}
