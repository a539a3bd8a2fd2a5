//! Reforge Core Library
//!
//! Validation engine and refinement loop for self-checking generation
//! pipelines. A [`ValidatorRunner`] asks a text generator to judge an artifact
//! against named rubrics and aggregates the verdicts into a
//! [`ValidationReport`]; a [`RefinementLoop`] regenerates the artifact from
//! that report until it converges or the iteration budget runs out.

pub mod audit;
pub mod config;
pub mod domain;
pub mod events;
pub mod llm;
pub mod metrics;
pub mod refinement;
pub mod reporting;
pub mod runner;
pub mod telemetry;
pub mod templates;

pub use audit::{
    content_digest, read_refinement_artifact, read_report_artifact, write_refinement_artifact,
    write_report_artifact,
};
pub use config::{ReforgeConfig, RefinementConfig, RunnerConfig};
pub use domain::{
    penalty_score, FeedbackItem, Finding, InputMap, RefinementIteration, RefinementOutcome,
    RefinementResult, ReforgeError, Result, Severity, SeverityCounts, ValidationLevel,
    ValidationReport, ValidationResult, ValidationStatus,
};
pub use events::{ChannelEventSink, EventSink, NoopEventSink, ReforgeEvent, TracingEventSink};
pub use llm::{
    GenerationError, GenerationRequest, HttpGeneratorConfig, HttpTextGenerator, ModelSelector,
    ModelTier, ModelTiers, TextGenerator, TieredModelSelector,
};
pub use metrics::{RunnerStats, RunnerStatsSnapshot};
pub use refinement::{
    has_converged, manual_feedback, FeedbackExtraction, FeedbackExtractor, LlmFeedbackExtractor,
    ManualFeedbackExtractor, RefinementLoop,
};
pub use reporting::{render_refinement_md, render_report_md, write_report_md};
pub use runner::{report_validator, ValidatorRunner};
pub use telemetry::{init_tracing, LogFormat, LogOptions};
pub use templates::{fill_template, TemplateRegistry, ValidationContext};

/// Crate version, for user agents and CLI output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
