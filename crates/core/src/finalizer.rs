//! Report finalization.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::audit::{self, actions, resource_types, AuditFact, AuditSink};
use crate::error::CoreError;
use crate::report::REPORT_STATUS_FINAL;
use crate::store::ReportStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalizeOutcome {
    Finalized,
    /// The report was already final; nothing was written.
    AlreadyFinal,
}

pub struct Finalizer {
    reports: Arc<dyn ReportStore>,
    audit: Arc<dyn AuditSink>,
}

impl Finalizer {
    pub fn new(reports: Arc<dyn ReportStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { reports, audit }
    }

    /// Set the report's status to `final`. Safe to call again.
    pub async fn finalize(
        &self,
        report_id: &str,
        actor_id: &str,
    ) -> Result<FinalizeOutcome, CoreError> {
        let report = self.reports.read_report(report_id).await?;
        if report.is_final() {
            tracing::debug!(report_id, "Report already final, skipping");
            return Ok(FinalizeOutcome::AlreadyFinal);
        }

        self.reports
            .update_report_status(report_id, REPORT_STATUS_FINAL)
            .await?;

        tracing::info!(report_id, actor_id, "Report finalized");
        let fact = AuditFact::new(actions::REPORT_FINALIZE, resource_types::REPORT, report_id)
            .with_actor(actor_id)
            .with_details(json!({
                "previousStatus": report.status,
                "status": REPORT_STATUS_FINAL,
            }));
        audit::emit(self.audit.as_ref(), fact).await;

        Ok(FinalizeOutcome::Finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::report::ReportSnapshot;
    use crate::store::MemoryReportStore;
    use assert_matches::assert_matches;

    async fn setup() -> (Finalizer, Arc<MemoryReportStore>, Arc<MemoryAuditSink>) {
        let store = Arc::new(MemoryReportStore::new());
        let mut report = ReportSnapshot::new("r-1");
        report.status = Some("preliminary".into());
        store.put(report).await;
        let sink = Arc::new(MemoryAuditSink::new());
        (Finalizer::new(store.clone(), sink.clone()), store, sink)
    }

    #[tokio::test]
    async fn sets_status_final_and_audits_once() {
        let (finalizer, store, sink) = setup().await;
        assert_eq!(finalizer.finalize("r-1", "dr-path").await.unwrap(), FinalizeOutcome::Finalized);
        assert!(store.read_report("r-1").await.unwrap().is_final());

        let facts = sink.facts_for(actions::REPORT_FINALIZE);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].details["previousStatus"], "preliminary");
    }

    #[tokio::test]
    async fn second_call_is_a_noop() {
        let (finalizer, _, sink) = setup().await;
        finalizer.finalize("r-1", "dr-path").await.unwrap();
        assert_eq!(
            finalizer.finalize("r-1", "dr-path").await.unwrap(),
            FinalizeOutcome::AlreadyFinal
        );
        assert_eq!(sink.facts_for(actions::REPORT_FINALIZE).len(), 1);
    }

    #[tokio::test]
    async fn missing_report_is_not_found() {
        let (finalizer, _, _) = setup().await;
        assert_matches!(
            finalizer.finalize("ghost", "dr-path").await,
            Err(CoreError::NotFound { .. })
        );
    }
}
