//! End-to-end run of a pathology report through every validation step.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;

use labflow_core::actor::ActorContext;
use labflow_core::audit::{actions, MemoryAuditSink};
use labflow_core::config::EngineConfig;
use labflow_core::directory::MemoryIdentityDirectory;
use labflow_core::error::CoreError;
use labflow_core::finalizer::FinalizeOutcome;
use labflow_core::report::{CodeableConcept, Reference, ReportSnapshot};
use labflow_core::signature::{MemoryCredentialValidator, SignatureCredentials};
use labflow_core::store::{MemoryReportStore, ReportStore};
use labflow_core::validation::rules::{has_unresolved_errors, RULE_COMPLETENESS};
use labflow_core::workflow::model::{
    STEP_AUTO_VALIDATION, STEP_DIGITAL_SIGNOFF, STEP_PATHOLOGIST_REVIEW, STEP_TECHNICAL_REVIEW,
};
use labflow_core::workflow::{
    CompleteStep, MemoryWorkflowRepository, StepOutcome, StepStatus, WorkflowEngine,
    WorkflowPriority, WorkflowStatus,
};

/// Report store that counts status updates and can fail the next ones.
struct CountingStore {
    inner: MemoryReportStore,
    status_updates: AtomicUsize,
    failures_left: AtomicUsize,
}

#[async_trait]
impl ReportStore for CountingStore {
    async fn read_report(&self, report_id: &str) -> Result<ReportSnapshot, CoreError> {
        self.inner.read_report(report_id).await
    }

    async fn save_report(&self, report: &ReportSnapshot) -> Result<(), CoreError> {
        self.inner.save_report(report).await
    }

    async fn update_report_status(&self, report_id: &str, status: &str) -> Result<(), CoreError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CoreError::report_store("connection reset"));
        }
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_report_status(report_id, status).await
    }
}

fn r1() -> ReportSnapshot {
    let mut report = ReportSnapshot::new("R1");
    report.status = Some("preliminary".into());
    report
        .category
        .push(CodeableConcept::coded("http://terminology.hl7.org/CodeSystem/v2-0074", "PAT"));
    report.code = Some(CodeableConcept::coded("http://loinc.org", "60567-5"));
    report.subject = Some(Reference::to("Patient/p-42"));
    report.effective_date_time = Some("2024-05-02T08:30:00Z".into());
    report.result = (1..=12)
        .map(|i| Reference::to(format!("Observation/obs-{i}")))
        .collect();
    report
}

async fn setup() -> (WorkflowEngine, Arc<CountingStore>, Arc<MemoryAuditSink>) {
    let inner = MemoryReportStore::new();
    inner.put(r1()).await;
    let store = Arc::new(CountingStore {
        inner,
        status_updates: AtomicUsize::new(0),
        failures_left: AtomicUsize::new(0),
    });
    let directory = Arc::new(MemoryIdentityDirectory::new());
    directory.register("mgr", ["lab-manager"]).await;
    directory.register("tech-1", ["lab-technician"]).await;
    directory.register("dr-path", ["pathologist"]).await;
    let sink = Arc::new(MemoryAuditSink::new());
    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(MemoryWorkflowRepository::new()),
        Arc::new(MemoryCredentialValidator::new().with_password("dr-path", "s3cret")),
        directory,
        sink.clone(),
        EngineConfig::default(),
    );
    (engine, store, sink)
}

fn completed() -> CompleteStep {
    CompleteStep {
        outcome: StepOutcome::Completed,
        notes: None,
        signature: None,
    }
}

#[tokio::test]
async fn r1_moves_from_preliminary_to_final() {
    let (engine, store, sink) = setup().await;
    let manager = ActorContext::new("mgr", "Lab Manager").with_roles(["lab-manager"]);
    let tech = ActorContext::new("tech-1", "Tech One").with_roles(["lab-technician"]);
    let pathologist = ActorContext::new("dr-path", "Dr Path")
        .with_roles(["pathologist"])
        .with_network(Some("10.1.2.3".into()), Some("lims-client/2.1".into()));

    // Plan
    let plan = engine.plan("R1").await.unwrap();
    let ids: Vec<_> = plan.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            STEP_AUTO_VALIDATION,
            STEP_TECHNICAL_REVIEW,
            STEP_PATHOLOGIST_REVIEW,
            STEP_DIGITAL_SIGNOFF
        ]
    );
    let orders: Vec<_> = plan.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![1, 2, 3, 4]);

    let wf = engine
        .create_workflow("R1", WorkflowPriority::Routine, &manager)
        .await
        .unwrap();
    assert_eq!(wf.step_ids(), ids);
    assert_eq!(wf.current_step.as_deref(), Some(STEP_AUTO_VALIDATION));

    // Automatic validation fixes the missing issued date
    let auto = engine.run_auto_validation(wf.id).await.unwrap();
    let completeness = auto
        .run
        .results
        .iter()
        .find(|r| r.rule_id == RULE_COMPLETENESS)
        .unwrap();
    assert!(completeness.passed && completeness.auto_fixed);
    assert!(!has_unresolved_errors(&auto.run.results));
    assert!(store.read_report("R1").await.unwrap().issued.is_some());
    assert_eq!(auto.workflow.current_step.as_deref(), Some(STEP_TECHNICAL_REVIEW));

    // Technical review
    engine
        .assign_step(wf.id, STEP_TECHNICAL_REVIEW, "tech-1", &manager)
        .await
        .unwrap();
    let wf_after_tech = engine
        .complete_step(wf.id, STEP_TECHNICAL_REVIEW, completed(), &tech)
        .await
        .unwrap();
    assert_eq!(wf_after_tech.current_step.as_deref(), Some(STEP_PATHOLOGIST_REVIEW));
    assert_eq!(wf_after_tech.steps[3].status, StepStatus::Pending);

    // Pathologist review with a password signature
    engine
        .assign_step(wf.id, STEP_PATHOLOGIST_REVIEW, "dr-path", &manager)
        .await
        .unwrap();
    let signature = engine
        .create_signature(
            "R1",
            "password",
            &SignatureCredentials::password("s3cret"),
            Some(&pathologist),
        )
        .await
        .unwrap();
    assert_eq!(signature.ip_address.as_deref(), Some("10.1.2.3"));
    let wf_after_review = engine
        .complete_step(
            wf.id,
            STEP_PATHOLOGIST_REVIEW,
            CompleteStep {
                notes: Some("Findings consistent with benign nevus".into()),
                signature: Some(signature.clone()),
                ..completed()
            },
            &pathologist,
        )
        .await
        .unwrap();
    assert_eq!(wf_after_review.current_step.as_deref(), Some(STEP_DIGITAL_SIGNOFF));
    assert_eq!(wf_after_review.steps[2].digital_signature.as_ref(), Some(&signature));
    assert_eq!(store.status_updates.load(Ordering::SeqCst), 0);

    // Sign-off
    engine
        .assign_step(wf.id, STEP_DIGITAL_SIGNOFF, "dr-path", &manager)
        .await
        .unwrap();
    let done = engine
        .complete_step(wf.id, STEP_DIGITAL_SIGNOFF, completed(), &pathologist)
        .await
        .unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert!(done.current_step.is_none());
    assert!(store.read_report("R1").await.unwrap().is_final());
    assert_eq!(store.status_updates.load(Ordering::SeqCst), 1);

    // Retrying finalization writes nothing
    engine.finalize_report("R1", &pathologist).await.unwrap();
    assert_eq!(store.status_updates.load(Ordering::SeqCst), 1);

    // Terminal workflow rejects further transitions
    assert_matches!(
        engine
            .complete_step(wf.id, STEP_DIGITAL_SIGNOFF, completed(), &pathologist)
            .await,
        Err(CoreError::InvalidState(_))
    );

    assert_eq!(sink.facts_for(actions::STEP_COMPLETE).len(), 4);
    assert_eq!(sink.facts_for(actions::REPORT_FINALIZE).len(), 1);
    let signed = sink.facts_for(actions::SIGNATURE_CREATE);
    assert_eq!(signed.len(), 1);
    assert!(!signed[0].details.to_string().contains("s3cret"));
}

#[tokio::test]
async fn rejection_is_terminal() {
    let (engine, store, _) = setup().await;
    let manager = ActorContext::new("mgr", "Lab Manager").with_roles(["lab-manager"]);
    let wf = engine
        .create_workflow("R1", WorkflowPriority::Stat, &manager)
        .await
        .unwrap();
    engine.run_auto_validation(wf.id).await.unwrap();
    engine
        .assign_step(wf.id, STEP_TECHNICAL_REVIEW, "mgr", &manager)
        .await
        .unwrap();

    let rejected = engine
        .complete_step(
            wf.id,
            STEP_TECHNICAL_REVIEW,
            CompleteStep {
                outcome: StepOutcome::Failed,
                notes: Some("Hemolyzed specimen".into()),
                signature: None,
            },
            &manager,
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, WorkflowStatus::Rejected);

    assert_matches!(
        engine
            .complete_step(wf.id, STEP_TECHNICAL_REVIEW, completed(), &manager)
            .await,
        Err(CoreError::InvalidState(_))
    );
    assert_matches!(
        engine.assign_step(wf.id, STEP_PATHOLOGIST_REVIEW, "dr-path", &manager).await,
        Err(CoreError::InvalidState(_))
    );
    assert!(!store.read_report("R1").await.unwrap().is_final());
    assert_eq!(store.status_updates.load(Ordering::SeqCst), 0);

    // A rejected report can start over
    engine
        .create_workflow("R1", WorkflowPriority::Stat, &manager)
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_workflow_is_not_found() {
    let (engine, _, _) = setup().await;
    let id = uuid::Uuid::now_v7();
    assert_matches!(
        engine.run_auto_validation(id).await,
        Err(CoreError::NotFound { entity: "Workflow", .. })
    );
    assert_matches!(
        engine
            .cancel_workflow(id, None, &ActorContext::system())
            .await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn finalization_failure_after_commit_can_be_retried() {
    let (engine, store, sink) = setup().await;
    let manager = ActorContext::new("mgr", "Lab Manager").with_roles(["lab-manager"]);
    let pathologist = ActorContext::new("dr-path", "Dr Path").with_roles(["pathologist"]);
    let wf = engine
        .create_workflow("R1", WorkflowPriority::Routine, &manager)
        .await
        .unwrap();
    engine.run_auto_validation(wf.id).await.unwrap();
    for (step, assignee, actor) in [
        (STEP_TECHNICAL_REVIEW, "mgr", &manager),
        (STEP_PATHOLOGIST_REVIEW, "dr-path", &pathologist),
        (STEP_DIGITAL_SIGNOFF, "dr-path", &pathologist),
    ] {
        engine.assign_step(wf.id, step, assignee, &manager).await.unwrap();
        if step == STEP_DIGITAL_SIGNOFF {
            store.failures_left.store(1, Ordering::SeqCst);
        }
        let result = engine.complete_step(wf.id, step, completed(), actor).await;
        if step == STEP_DIGITAL_SIGNOFF {
            assert_matches!(result, Err(CoreError::Collaborator { .. }));
        } else {
            result.unwrap();
        }
    }

    // The last step stays committed while the report is not final yet
    let stored = engine.get_workflow(wf.id).await.unwrap();
    assert_eq!(stored.status, WorkflowStatus::Completed);
    assert!(!store.read_report("R1").await.unwrap().is_final());
    assert_eq!(store.status_updates.load(Ordering::SeqCst), 0);

    assert_matches!(
        engine.finalize_report("R1", &pathologist).await,
        Ok(FinalizeOutcome::Finalized)
    );
    assert_matches!(
        engine.finalize_report("R1", &pathologist).await,
        Ok(FinalizeOutcome::AlreadyFinal)
    );
    assert!(store.read_report("R1").await.unwrap().is_final());
    assert_eq!(store.status_updates.load(Ordering::SeqCst), 1);
    assert_eq!(sink.facts_for(actions::REPORT_FINALIZE).len(), 1);
}
