//! Validator runner: artifact + validator name → exactly one result.
//!
//! A validator is a name in the [`TemplateRegistry`]; there is one runner
//! capability, parameterized by that name. Per call the runner resolves the
//! rubric, picks a model for the level, fills the template, asks the
//! generator to judge, decodes the verdict and prices the call.
//!
//! Upstream and decode failures become a FAIL result with one CRITICAL
//! `validation_error` finding. Only misuse (empty artifact, unknown
//! validator) is returned as an error.

pub mod verdict;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::config::RunnerConfig;
use crate::domain::{
    InputMap, ReforgeError, Result, ValidationLevel, ValidationReport, ValidationResult,
    ValidationStatus,
};
use crate::events::{EventSink, NoopEventSink, ReforgeEvent};
use crate::llm::{GenerationRequest, ModelSelector, TextGenerator};
use crate::metrics::{RunnerStats, RunnerStatsSnapshot};
use crate::templates::{fill_template, TemplateRegistry, ValidationContext};

pub use verdict::{parse_verdict, strip_code_fence, ParsedVerdict};

/// Runs named validators against artifacts.
pub struct ValidatorRunner {
    registry: Arc<TemplateRegistry>,
    generator: Arc<dyn TextGenerator>,
    selector: Arc<dyn ModelSelector>,
    config: RunnerConfig,
    events: Arc<dyn EventSink>,
    stats: RunnerStats,
}

/// Successful judge call, before it becomes a result.
struct Judgement {
    verdict: ParsedVerdict,
    cost_usd: f64,
}

impl ValidatorRunner {
    /// Build a runner. Fails on an invalid [`RunnerConfig`].
    pub fn new(
        registry: Arc<TemplateRegistry>,
        generator: Arc<dyn TextGenerator>,
        selector: Arc<dyn ModelSelector>,
        config: RunnerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            generator,
            selector,
            config,
            events: Arc::new(NoopEventSink),
            stats: RunnerStats::new(),
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Running totals across every call made by this runner.
    pub fn stats(&self) -> RunnerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Emit the running totals as one log event.
    pub fn flush_stats(&self) {
        self.stats.flush();
    }

    /// Judge `artifact` with `validator`.
    ///
    /// Returns `Err` only for an empty artifact or an unknown validator.
    /// Every other failure yields a FAIL result with score 0.
    #[instrument(skip_all, fields(validator = %validator, level = %level))]
    pub async fn validate(
        &self,
        artifact: &str,
        validator: &str,
        context: &ValidationContext,
        level: ValidationLevel,
    ) -> Result<ValidationResult> {
        if artifact.trim().is_empty() {
            return Err(ReforgeError::EmptyArtifact);
        }
        let template = self.registry.resolve(validator)?;
        let model = self.selector.select_model(validator, level);

        self.events.emit(&ReforgeEvent::ValidationStarted {
            validator: validator.to_string(),
            level,
            model: model.clone(),
        });

        let start = Instant::now();
        let judged = self
            .judge(&template, artifact, validator, context, level, &model)
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (result, failed) = match judged {
            Ok(judgement) => {
                let verdict = judgement.verdict;
                let result = ValidationResult::new(
                    validator,
                    verdict.status,
                    verdict.score,
                    verdict.findings,
                )
                .map(|r| {
                    r.with_passed_checks(verdict.passed_checks)
                        .with_metrics(verdict.metrics)
                        .with_cost(judgement.cost_usd)
                });
                match result {
                    Ok(r) => (r, false),
                    Err(e) => (ValidationResult::validation_error(validator, e), true),
                }
            }
            Err(e) => {
                warn!(validator = %validator, error = %e, "validation degraded to error result");
                (ValidationResult::validation_error(validator, e), true)
            }
        };

        let mut result = result.with_duration_ms(duration_ms).with_model(&model);
        if let Some(target) = context.get("file_path") {
            result = result.with_target(target);
        }

        self.stats.record(result.cost_usd, duration_ms, failed);
        self.emit_outcome(&result);
        Ok(result)
    }

    async fn judge(
        &self,
        template: &str,
        artifact: &str,
        validator: &str,
        context: &ValidationContext,
        level: ValidationLevel,
        model: &str,
    ) -> Result<Judgement> {
        let prompt = fill_template(template, artifact, context, level);
        let request = GenerationRequest::new(prompt, model)
            .with_temperature(self.config.temperature_for(validator))
            .with_max_tokens(self.config.max_tokens);

        debug!(model = %model, temperature = request.temperature, "requesting verdict");
        let response = self.generator.generate(&request).await?;

        let verdict = parse_verdict(validator, &response, self.config.default_confidence)?;
        let output_tokens = self.selector.estimate_tokens(&response);
        let cost_usd =
            self.selector
                .estimate_cost(model, self.config.nominal_input_tokens, output_tokens);

        Ok(Judgement { verdict, cost_usd })
    }

    fn emit_outcome(&self, result: &ValidationResult) {
        let event = if result.status == ValidationStatus::Pass {
            ReforgeEvent::ValidationPassed {
                validator: result.validator.clone(),
                score: result.score,
                duration_ms: result.duration_ms,
            }
        } else {
            ReforgeEvent::ValidationFailed {
                validator: result.validator.clone(),
                status: result.status,
                score: result.score,
                findings: result.findings.len(),
                duration_ms: result.duration_ms,
            }
        };
        self.events.emit(&event);
    }

    /// Run several validators concurrently and aggregate their results.
    ///
    /// Unknown validators are rejected before any call is made. Repeated
    /// names are judged once. Aggregation reads from a name-keyed map, so
    /// completion order is irrelevant.
    pub async fn validate_many(
        &self,
        artifact: &str,
        validators: &[String],
        context: &ValidationContext,
        level: ValidationLevel,
    ) -> Result<ValidationReport> {
        if artifact.trim().is_empty() {
            return Err(ReforgeError::EmptyArtifact);
        }
        if validators.is_empty() {
            return Err(ReforgeError::InvalidConfig(
                "at least one validator is required".to_string(),
            ));
        }
        if let Some(unknown) = validators.iter().find(|v| !self.registry.contains(v)) {
            return Err(ReforgeError::UnknownValidator(unknown.clone()));
        }

        let distinct: BTreeSet<&str> = validators.iter().map(String::as_str).collect();
        let runs = distinct
            .into_iter()
            .map(|name| self.validate(artifact, name, context, level));
        let results = join_all(runs)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let keyed: BTreeMap<String, ValidationResult> = results
            .into_iter()
            .map(|r| (r.validator.clone(), r))
            .collect();
        Ok(ValidationReport::new(keyed))
    }
}

/// Flatten a JSON input map into template context strings.
///
/// Strings are used as-is; other values are rendered as JSON.
pub fn context_from_input(input: &InputMap) -> ValidationContext {
    input
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

/// Boxed future returned by [`report_validator`].
pub type ReportFuture = Pin<Box<dyn Future<Output = anyhow::Result<ValidationReport>> + Send>>;

/// Adapt a runner into a refinement-loop validate function.
///
/// The returned closure validates each artifact with `validators` at `level`,
/// using the loop's input map as template context.
pub fn report_validator(
    runner: Arc<ValidatorRunner>,
    validators: Vec<String>,
    level: ValidationLevel,
) -> impl Fn(String, InputMap) -> ReportFuture + Send + Sync + 'static {
    move |artifact: String, input: InputMap| -> ReportFuture {
        let runner = Arc::clone(&runner);
        let validators = validators.clone();
        Box::pin(async move {
            let context = context_from_input(&input);
            let report = runner
                .validate_many(&artifact, &validators, &context, level)
                .await?;
            Ok(report)
        })
    }
}
