//! Bounded generate → validate → feedback → regenerate loop.
//!
//! The loop is generic over two caller-supplied async functions: one that
//! produces an artifact from an input map and one that judges an artifact
//! into a [`ValidationReport`]. It stops at the first converged iteration,
//! when the budget runs out, on the first error, or when cancelled at an
//! iteration boundary. Iterations are strictly sequential.

pub mod feedback;
pub mod prompt;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::config::RefinementConfig;
use crate::domain::{
    FeedbackItem, InputMap, RefinementIteration, RefinementOutcome, RefinementResult, Result,
    ValidationReport, ValidationStatus,
};
use crate::events::{refinement_span, EventSink, NoopEventSink, ReforgeEvent};

pub use feedback::{
    manual_feedback, parse_feedback, FeedbackExtraction, FeedbackExtractor, FeedbackRequest,
    LlmFeedbackExtractor, ManualFeedbackExtractor, MAX_STRUCTURED_ITEMS,
};
pub use prompt::{
    build_regeneration_prompt, original_task, PREVIOUS_ATTEMPT_KEY, REGENERATION_PROMPT_KEY,
    VALIDATION_FEEDBACK_KEY,
};

/// Convergence rule.
///
/// PASS with an average at or above the threshold, or, with `allow_partial`,
/// WARNING with no critical findings and an average at or above the threshold.
pub fn has_converged(report: &ValidationReport, config: &RefinementConfig) -> bool {
    let meets_threshold = report.average_score() >= config.min_score_threshold;
    match report.overall_status() {
        ValidationStatus::Pass => meets_threshold,
        ValidationStatus::Warning => {
            config.allow_partial && report.critical_count() == 0 && meets_threshold
        }
        ValidationStatus::Fail => false,
    }
}

/// Drives refinement runs. Holds no per-run state, so one loop can serve
/// many runs.
pub struct RefinementLoop {
    config: RefinementConfig,
    extractor: Option<Arc<dyn FeedbackExtractor>>,
    events: Arc<dyn EventSink>,
}

/// Accumulated state of one run.
struct RunState {
    run_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    iterations: Vec<RefinementIteration>,
    total_cost_usd: f64,
}

impl RunState {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            iterations: Vec::new(),
            total_cost_usd: 0.0,
        }
    }

    fn finish(self, outcome: RefinementOutcome, error: Option<String>) -> RefinementResult {
        let converged = outcome == RefinementOutcome::Converged;
        let last = self.iterations.last();
        RefinementResult {
            run_id: self.run_id.clone(),
            success: converged,
            outcome,
            final_artifact: last.map(|i| i.artifact.clone()),
            final_report: last.map(|i| i.report.clone()),
            total_iterations: self.iterations.len() as u32,
            converged,
            started_at: self.started_at,
            total_duration_ms: self.started.elapsed().as_millis() as u64,
            total_cost_usd: self.total_cost_usd,
            error,
            iterations: self.iterations,
        }
    }
}

impl RefinementLoop {
    /// Fails with `InvalidConfig` when the config is out of range.
    pub fn new(config: RefinementConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractor: None,
            events: Arc::new(NoopEventSink),
        })
    }

    /// Use `extractor` for structured feedback, falling back to the manual
    /// heuristic when it fails.
    pub fn with_feedback_extractor(mut self, extractor: Arc<dyn FeedbackExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Run the loop to a terminal state.
    pub async fn refine<G, GF, V, VF>(
        &self,
        input: InputMap,
        generate_fn: G,
        validate_fn: V,
    ) -> RefinementResult
    where
        G: Fn(InputMap) -> GF,
        GF: Future<Output = anyhow::Result<String>>,
        V: Fn(String, InputMap) -> VF,
        VF: Future<Output = anyhow::Result<ValidationReport>>,
    {
        self.refine_with_cancel(input, generate_fn, validate_fn, &CancellationToken::new())
            .await
    }

    /// Like [`refine`](Self::refine), checking `cancel` before each iteration.
    /// An in-flight generate or validate call is never interrupted.
    pub async fn refine_with_cancel<G, GF, V, VF>(
        &self,
        input: InputMap,
        generate_fn: G,
        validate_fn: V,
        cancel: &CancellationToken,
    ) -> RefinementResult
    where
        G: Fn(InputMap) -> GF,
        GF: Future<Output = anyhow::Result<String>>,
        V: Fn(String, InputMap) -> VF,
        VF: Future<Output = anyhow::Result<ValidationReport>>,
    {
        let state = RunState::new();
        let span = refinement_span(&state.run_id);
        self.run(state, input, generate_fn, validate_fn, cancel)
            .instrument(span)
            .await
    }

    async fn run<G, GF, V, VF>(
        &self,
        mut state: RunState,
        input: InputMap,
        generate_fn: G,
        validate_fn: V,
        cancel: &CancellationToken,
    ) -> RefinementResult
    where
        G: Fn(InputMap) -> GF,
        GF: Future<Output = anyhow::Result<String>>,
        V: Fn(String, InputMap) -> VF,
        VF: Future<Output = anyhow::Result<ValidationReport>>,
    {
        let max_iterations = self.config.max_iterations;
        self.events.emit(&ReforgeEvent::RefinementStarted {
            run_id: state.run_id.clone(),
            max_iterations,
            threshold: self.config.min_score_threshold,
        });

        let task = original_task(&input);
        let mut current_input = input.clone();

        for iteration in 1..=max_iterations {
            if cancel.is_cancelled() {
                let error = format!("refinement cancelled before iteration {iteration}");
                return self.complete(state, RefinementOutcome::Cancelled, Some(error));
            }

            self.events.emit(&ReforgeEvent::IterationStarted {
                run_id: state.run_id.clone(),
                iteration,
            });
            let iteration_start = Instant::now();

            let artifact = match generate_fn(current_input.clone()).await {
                Ok(a) if a.trim().is_empty() => {
                    let error = format!("generator returned an empty artifact on iteration {iteration}");
                    return self.errored(state, iteration, error);
                }
                Ok(a) => a,
                Err(e) => {
                    let error = format!("generation failed on iteration {iteration}: {e:#}");
                    return self.errored(state, iteration, error);
                }
            };

            let report = match validate_fn(artifact.clone(), current_input.clone()).await {
                Ok(r) => r,
                Err(e) => {
                    let error = format!("validation failed on iteration {iteration}: {e:#}");
                    return self.errored(state, iteration, error);
                }
            };

            let converged = has_converged(&report, &self.config);
            let (feedback, regeneration_prompt) = if converged {
                (Vec::new(), String::new())
            } else {
                let extraction = self.extract_feedback(&report, &artifact, &task).await;
                let prompt = build_regeneration_prompt(
                    &input,
                    &artifact,
                    &report,
                    &extraction.items,
                    extraction.regeneration_prompt.as_deref(),
                );
                (extraction.items, prompt)
            };

            let duration_ms = iteration_start.elapsed().as_millis() as u64;
            let cost_usd = report.total_cost_usd();
            state.total_cost_usd += cost_usd;

            self.events.emit(&ReforgeEvent::IterationCompleted {
                run_id: state.run_id.clone(),
                iteration,
                status: report.overall_status(),
                score: report.average_score(),
                critical: report.critical_count(),
                duration_ms,
            });

            if !converged && iteration < max_iterations {
                current_input = next_input(&input, &artifact, &feedback, &regeneration_prompt);
            }

            state.iterations.push(RefinementIteration {
                iteration,
                artifact,
                report,
                feedback,
                regeneration_prompt,
                timestamp: Utc::now(),
                duration_ms,
                cost_usd,
            });

            if converged {
                return self.complete(state, RefinementOutcome::Converged, None);
            }
        }

        let error = format!("maximum iterations ({max_iterations}) reached without convergence");
        self.complete(state, RefinementOutcome::Exhausted, Some(error))
    }

    async fn extract_feedback(
        &self,
        report: &ValidationReport,
        artifact: &str,
        task: &str,
    ) -> FeedbackExtraction {
        if let Some(extractor) = &self.extractor {
            let request = FeedbackRequest {
                report,
                artifact,
                task,
                max_items: self.config.max_structured_items,
            };
            let attempts = self.config.structured_feedback_attempts;
            for attempt in 1..=attempts {
                match extractor.extract(request).await {
                    Ok(mut extraction) if !extraction.items.is_empty() => {
                        extraction.items.truncate(self.config.max_structured_items);
                        return extraction;
                    }
                    Ok(_) => {
                        debug!(extractor = extractor.name(), attempt, "extractor returned no items")
                    }
                    Err(e) => {
                        debug!(extractor = extractor.name(), attempt, error = %e, "feedback extraction failed")
                    }
                }
            }
            warn!(
                extractor = extractor.name(),
                attempts, "structured feedback unavailable, using manual extraction"
            );
        }
        FeedbackExtraction {
            items: manual_feedback(report),
            regeneration_prompt: None,
        }
    }

    fn errored(&self, state: RunState, iteration: u32, error: String) -> RefinementResult {
        self.events.emit(&ReforgeEvent::RefinementErrored {
            run_id: state.run_id.clone(),
            iteration,
            error: error.clone(),
        });
        state.finish(RefinementOutcome::Errored, Some(error))
    }

    fn complete(
        &self,
        state: RunState,
        outcome: RefinementOutcome,
        error: Option<String>,
    ) -> RefinementResult {
        let result = state.finish(outcome, error);
        self.events.emit(&ReforgeEvent::RefinementCompleted {
            run_id: result.run_id.clone(),
            converged: result.converged,
            iterations: result.total_iterations,
            duration_ms: result.total_duration_ms,
            cost_usd: result.total_cost_usd,
        });
        result
    }
}

/// Original input plus the previous attempt and its feedback.
fn next_input(
    original: &InputMap,
    artifact: &str,
    feedback: &[FeedbackItem],
    regeneration_prompt: &str,
) -> InputMap {
    let mut next = original.clone();
    next.insert(
        PREVIOUS_ATTEMPT_KEY.to_string(),
        serde_json::Value::String(artifact.to_string()),
    );
    next.insert(
        VALIDATION_FEEDBACK_KEY.to_string(),
        serde_json::to_value(feedback).unwrap_or_default(),
    );
    next.insert(
        REGENERATION_PROMPT_KEY.to_string(),
        serde_json::Value::String(regeneration_prompt.to_string()),
    );
    next
}
