//! Job lifecycle through the service front door.

use std::sync::Arc;
use std::time::Duration;

use xmlforge_core::fakes::{FakeAnalyzer, FakeGenerator, ScriptedTester};
use xmlforge_core::{
    Collaborators, DocumentPair, ForgeError, JobOptions, JobService, JobStatus, Orchestrator,
    RuleSet, ScoreDetail, ScoreResult,
};

fn passing() -> ScoreResult {
    ScoreResult::from_details(vec![ScoreDetail::passed("p", "<a/>".into(), "<a/>".into())])
}

fn failing() -> ScoreResult {
    ScoreResult::from_details(vec![ScoreDetail::failed(
        "p",
        "<a/>".into(),
        "<b/>".into(),
        "Found 1 difference(s):\n  1. Tag mismatch at /: 'a' vs 'b'".into(),
    )])
}

fn service_with(tester: ScriptedTester) -> (JobService, Arc<ScriptedTester>) {
    let tester = Arc::new(tester);
    let orchestrator = Orchestrator::new(Collaborators::new(
        Arc::new(FakeAnalyzer::new(RuleSet::default())),
        Arc::new(FakeGenerator::with_source("fn transform_xml(input) { return input; }")),
        tester.clone(),
    ));
    (JobService::new(orchestrator), tester)
}

fn pairs() -> Vec<DocumentPair> {
    vec![DocumentPair::new("<a/>", "<a/>").with_id("p")]
}

#[tokio::test]
async fn test_submit_then_wait_for_completion() {
    let (service, _) = service_with(ScriptedTester::new(vec![passing()]));
    let summary = service.submit(pairs(), JobOptions::default()).await.unwrap();
    assert_eq!(summary.message, "Job created");
    assert_eq!(summary.status, JobStatus::Pending);

    let done = service.wait(&summary.job_id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.current_iteration, 1);

    let fetched = service.get(&summary.job_id).await.unwrap();
    assert_eq!(fetched, done);
}

#[tokio::test]
async fn test_invalid_submissions_are_rejected() {
    let (service, _) = service_with(ScriptedTester::new(vec![passing()]));

    let err = service.submit(Vec::new(), JobOptions::default()).await.unwrap_err();
    assert!(matches!(err, ForgeError::InvalidJob(_)));

    let options = JobOptions {
        max_iterations: 0,
        accuracy_threshold: 0.9,
    };
    let err = service.submit(pairs(), options).await.unwrap_err();
    assert!(matches!(err, ForgeError::InvalidJob(_)));

    let duplicated = vec![
        DocumentPair::new("<a/>", "<a/>").with_id("same"),
        DocumentPair::new("<b/>", "<b/>").with_id("same"),
    ];
    let err = service.submit(duplicated, JobOptions::default()).await.unwrap_err();
    assert!(err.to_string().contains("duplicate pair id 'same'"));

    assert!(service.list().await.is_empty());
}

#[tokio::test]
async fn test_unknown_job() {
    let (service, _) = service_with(ScriptedTester::new(vec![passing()]));
    for err in [
        service.get("missing").await.unwrap_err(),
        service.rerun("missing").await.unwrap_err(),
        service.cancel("missing").await.unwrap_err(),
    ] {
        assert!(matches!(err, ForgeError::JobNotFound(ref id) if id == "missing"));
    }
}

#[tokio::test]
async fn test_list_reports_every_job_in_submission_order() {
    let (service, _) = service_with(ScriptedTester::new(vec![passing()]));
    let first = service.submit(pairs(), JobOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let second = service.submit(pairs(), JobOptions::default()).await.unwrap();
    service.wait(&first.job_id).await.unwrap();
    service.wait(&second.job_id).await.unwrap();

    let listed = service.list().await;
    let ids: Vec<&str> = listed.iter().map(|s| s.job_id.as_str()).collect();
    assert_eq!(ids, vec![first.job_id.as_str(), second.job_id.as_str()]);
    assert!(listed.iter().all(|s| s.status == JobStatus::Completed));
}

#[tokio::test]
async fn test_rerun_starts_over_with_same_pairs() {
    let (service, tester) = service_with(ScriptedTester::new(vec![failing(), passing()]));
    let options = JobOptions {
        max_iterations: 1,
        accuracy_threshold: 0.95,
    };
    let summary = service.submit(pairs(), options).await.unwrap();
    let first = service.wait(&summary.job_id).await.unwrap();
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.accuracy(), Some(0.0));

    let restarted = service.rerun(&summary.job_id).await.unwrap();
    assert_eq!(restarted.message, "Job re-started");
    assert_eq!(restarted.status, JobStatus::Pending);

    let second = service.wait(&summary.job_id).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.pairs, first.pairs);
    assert_eq!(second.current_iteration, 1);
    assert_eq!(second.accuracy(), Some(1.0));
    assert_eq!(tester.calls(), 2);
}

#[tokio::test]
async fn test_rerun_refused_while_running() {
    let (service, _) = service_with(
        ScriptedTester::new(vec![failing()]).with_delay(Duration::from_millis(100)),
    );
    let summary = service.submit(pairs(), JobOptions::default()).await.unwrap();

    let err = service.rerun(&summary.job_id).await.unwrap_err();
    assert!(matches!(err, ForgeError::JobRunning(_)));

    service.cancel(&summary.job_id).await.unwrap();
    service.wait(&summary.job_id).await.unwrap();
}

#[tokio::test]
async fn test_cancel_running_job() {
    let (service, tester) = service_with(
        ScriptedTester::new(vec![failing()]).with_delay(Duration::from_millis(50)),
    );
    let options = JobOptions {
        max_iterations: 20,
        accuracy_threshold: 0.95,
    };
    let summary = service.submit(pairs(), options).await.unwrap();
    while tester.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let cancelled = service.cancel(&summary.job_id).await.unwrap();
    assert_eq!(cancelled.message, "Cancellation requested");

    let done = service.wait(&summary.job_id).await.unwrap();
    assert_eq!(done.status, JobStatus::Cancelled);
    assert!(done.current_iteration < 20);
    assert!(done.status.is_terminal());
}

#[tokio::test]
async fn test_cancel_finished_job_is_a_no_op() {
    let (service, _) = service_with(ScriptedTester::new(vec![passing()]));
    let summary = service.submit(pairs(), JobOptions::default()).await.unwrap();
    service.wait(&summary.job_id).await.unwrap();

    let after = service.cancel(&summary.job_id).await.unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert!(after.message.starts_with("Completed with 100% accuracy"));
}
