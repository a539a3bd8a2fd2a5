//! Observability tests for validation and refinement lifecycle tracing.

use std::sync::Arc;

use reforge_core::llm::fakes::{FailingGenerator, ScriptedGenerator};
use reforge_core::{
    EventSink, GenerationError, InputMap, RefinementConfig, RefinementLoop, ReforgeEvent,
    RunnerConfig, RunnerStats, TemplateRegistry, TieredModelSelector, TracingEventSink,
    ValidationContext, ValidationLevel, ValidationReport, ValidationResult,
    ValidatorRunner,
};
use tracing_test::traced_test;

fn runner(generator: Arc<dyn reforge_core::TextGenerator>) -> ValidatorRunner {
    ValidatorRunner::new(
        Arc::new(TemplateRegistry::new()),
        generator,
        Arc::new(TieredModelSelector::default()),
        RunnerConfig::default(),
    )
    .unwrap()
    .with_events(Arc::new(TracingEventSink))
}

#[traced_test]
#[test]
fn tracing_sink_logs_event_name() {
    TracingEventSink.emit(&ReforgeEvent::RefinementStarted {
        run_id: "run-123".to_string(),
        max_iterations: 3,
        threshold: 85.0,
    });
    assert!(logs_contain("refinement.started"));
    assert!(logs_contain("run-123"));
}

#[traced_test]
#[test]
fn errored_event_is_logged() {
    TracingEventSink.emit(&ReforgeEvent::RefinementErrored {
        run_id: "run-err".to_string(),
        iteration: 2,
        error: "judge unavailable".to_string(),
    });
    assert!(logs_contain("refinement.errored"));
    assert!(logs_contain("judge unavailable"));
}

#[traced_test]
#[tokio::test]
async fn passed_validation_is_logged() {
    let runner = runner(Arc::new(ScriptedGenerator::repeating(
        r#"{"status": "PASS", "score": 97, "findings": []}"#,
    )));
    runner
        .validate("fn main() {}", "code", &ValidationContext::new(), ValidationLevel::Quick)
        .await
        .unwrap();
    assert!(logs_contain("validation.started"));
    assert!(logs_contain("validation.passed"));
}

#[traced_test]
#[tokio::test]
async fn degraded_validation_logs_warning_and_failure() {
    let runner = runner(Arc::new(FailingGenerator::new(GenerationError::EmptyResponse)));
    runner
        .validate("fn main() {}", "tests", &ValidationContext::new(), ValidationLevel::Quick)
        .await
        .unwrap();
    assert!(logs_contain("validation degraded to error result"));
    assert!(logs_contain("validation.failed"));
}

#[traced_test]
#[tokio::test]
async fn refinement_run_is_logged_within_its_span() {
    let refinement = RefinementLoop::new(RefinementConfig::new(1, 50.0).unwrap())
        .unwrap()
        .with_events(Arc::new(TracingEventSink));
    let generate = |_input: InputMap| async { Ok::<_, anyhow::Error>("x = 1".to_string()) };
    let validate = |_artifact: String, _input: InputMap| async {
        Ok::<_, anyhow::Error>(ValidationReport::from_results([ValidationResult::pass("code")]))
    };

    let result = refinement.refine(InputMap::new(), generate, validate).await;
    assert!(result.converged);
    assert!(logs_contain("reforge.refine"));
    assert!(logs_contain("refinement.completed"));
    assert!(logs_contain(&result.run_id));
}

#[traced_test]
#[test]
fn stats_flush_logs_totals() {
    let stats = RunnerStats::new();
    stats.record(0.25, 40, false);
    stats.flush();
    assert!(logs_contain("invocations"));
}
