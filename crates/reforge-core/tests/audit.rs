use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use reforge_core::{
    read_refinement_artifact, read_report_artifact, write_refinement_artifact,
    write_report_artifact, Finding, InputMap, RefinementConfig, RefinementLoop, ReforgeError,
    Severity, ValidationReport, ValidationResult, ValidationStatus,
};
use tempfile::tempdir;

fn failing_report() -> ValidationReport {
    let finding = Finding::new(
        "c1",
        Severity::Critical,
        "security",
        "line 1",
        "hardcoded token",
        "read it from the environment",
    )
    .with_references(vec!["CWE-798".to_string()]);
    ValidationReport::from_results([
        ValidationResult::fail("code", vec![finding]).with_cost(0.004),
        ValidationResult::pass("documentation"),
    ])
}

async fn exhausted_run() -> reforge_core::RefinementResult {
    let calls = Arc::new(AtomicU32::new(0));
    let generate = {
        let calls = calls.clone();
        move |_input: InputMap| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, anyhow::Error>(format!("token = \"v{n}\"")) }
        }
    };
    let validate =
        |_artifact: String, _input: InputMap| async { Ok::<_, anyhow::Error>(failing_report()) };
    RefinementLoop::new(RefinementConfig::new(2, 90.0).unwrap())
        .unwrap()
        .refine(InputMap::new(), generate, validate)
        .await
}

#[tokio::test]
async fn refinement_record_round_trips_with_digest() {
    let dir = tempdir().unwrap();
    let result = exhausted_run().await;

    let path = write_refinement_artifact(&result, dir.path()).unwrap();
    assert!(path.ends_with(format!("{}/refinement.json", result.run_id)));
    assert!(dir.path().join(&result.run_id).join("refinement.digest").exists());

    let loaded = read_refinement_artifact(&result.run_id, dir.path()).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.total_iterations, 2);
    assert_eq!(loaded.outcome, result.outcome);
    assert_eq!(loaded.error, result.error);
    assert_eq!(loaded.iterations[1].artifact, "token = \"v2\"");
    assert_eq!(
        loaded.final_report.as_ref().map(|r| r.critical_count()),
        Some(1)
    );
}

#[tokio::test]
async fn tampered_refinement_record_is_rejected() {
    let dir = tempdir().unwrap();
    let result = exhausted_run().await;
    let path = write_refinement_artifact(&result, dir.path()).unwrap();

    let mut json = std::fs::read_to_string(&path).unwrap();
    json = json.replace("\"converged\": false", "\"converged\": true");
    std::fs::write(&path, json).unwrap();

    let err = read_refinement_artifact(&result.run_id, dir.path()).unwrap_err();
    assert!(matches!(err, ReforgeError::DigestMismatch { .. }));
}

#[test]
fn report_record_round_trips() {
    let dir = tempdir().unwrap();
    let report = failing_report();

    write_report_artifact(&report, dir.path(), "main.py").unwrap();
    let loaded = read_report_artifact("main.py", dir.path()).unwrap();

    assert_eq!(loaded.overall_status(), ValidationStatus::Fail);
    assert_eq!(loaded.average_score(), report.average_score());
    assert_eq!(loaded.recommendations(), report.recommendations());
    assert_eq!(
        loaded.result("code").unwrap().findings[0].references,
        vec!["CWE-798"]
    );
}

#[test]
fn missing_record_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = read_report_artifact("nothing", dir.path()).unwrap_err();
    assert!(matches!(err, ReforgeError::Io(_)));
}
