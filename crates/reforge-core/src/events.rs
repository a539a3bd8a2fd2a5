//! Structured lifecycle notifications for refinement runs and validations.
//!
//! Events are fire-and-forget: [`EventSink::emit`] returns nothing, so a
//! sink that cannot deliver can never fail the operation that emitted.
//!
//! - [`TracingEventSink`] logs each event at `info!` (`warn!` for errors) with
//!   an `event = "..."` field.
//! - [`ChannelEventSink`] forwards events to a tokio channel.
//! - [`NoopEventSink`] discards everything.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::{ValidationLevel, ValidationStatus};

/// One lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReforgeEvent {
    RefinementStarted {
        run_id: String,
        max_iterations: u32,
        threshold: f64,
    },
    IterationStarted {
        run_id: String,
        iteration: u32,
    },
    IterationCompleted {
        run_id: String,
        iteration: u32,
        status: ValidationStatus,
        score: f64,
        critical: usize,
        duration_ms: u64,
    },
    RefinementCompleted {
        run_id: String,
        converged: bool,
        iterations: u32,
        duration_ms: u64,
        cost_usd: f64,
    },
    RefinementErrored {
        run_id: String,
        iteration: u32,
        error: String,
    },
    ValidationStarted {
        validator: String,
        level: ValidationLevel,
        model: String,
    },
    ValidationPassed {
        validator: String,
        score: f64,
        duration_ms: u64,
    },
    ValidationFailed {
        validator: String,
        status: ValidationStatus,
        score: f64,
        findings: usize,
        duration_ms: u64,
    },
}

impl ReforgeEvent {
    /// Dotted event name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            ReforgeEvent::RefinementStarted { .. } => "refinement.started",
            ReforgeEvent::IterationStarted { .. } => "refinement.iteration_started",
            ReforgeEvent::IterationCompleted { .. } => "refinement.iteration_completed",
            ReforgeEvent::RefinementCompleted { .. } => "refinement.completed",
            ReforgeEvent::RefinementErrored { .. } => "refinement.errored",
            ReforgeEvent::ValidationStarted { .. } => "validation.started",
            ReforgeEvent::ValidationPassed { .. } => "validation.passed",
            ReforgeEvent::ValidationFailed { .. } => "validation.failed",
        }
    }
}

/// Receiver of lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ReforgeEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &ReforgeEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &ReforgeEvent) {
        let name = event.name();
        match event {
            ReforgeEvent::RefinementStarted {
                run_id,
                max_iterations,
                threshold,
            } => info!(
                event = name,
                run_id = %run_id,
                max_iterations = max_iterations,
                threshold = threshold,
            ),
            ReforgeEvent::IterationStarted { run_id, iteration } => {
                info!(event = name, run_id = %run_id, iteration = iteration)
            }
            ReforgeEvent::IterationCompleted {
                run_id,
                iteration,
                status,
                score,
                critical,
                duration_ms,
            } => info!(
                event = name,
                run_id = %run_id,
                iteration = iteration,
                status = %status,
                score = score,
                critical = critical,
                duration_ms = duration_ms,
            ),
            ReforgeEvent::RefinementCompleted {
                run_id,
                converged,
                iterations,
                duration_ms,
                cost_usd,
            } => info!(
                event = name,
                run_id = %run_id,
                converged = converged,
                iterations = iterations,
                duration_ms = duration_ms,
                cost_usd = cost_usd,
            ),
            ReforgeEvent::RefinementErrored {
                run_id,
                iteration,
                error,
            } => warn!(event = name, run_id = %run_id, iteration = iteration, error = %error),
            ReforgeEvent::ValidationStarted {
                validator,
                level,
                model,
            } => info!(event = name, validator = %validator, level = %level, model = %model),
            ReforgeEvent::ValidationPassed {
                validator,
                score,
                duration_ms,
            } => info!(
                event = name,
                validator = %validator,
                score = score,
                duration_ms = duration_ms,
            ),
            ReforgeEvent::ValidationFailed {
                validator,
                status,
                score,
                findings,
                duration_ms,
            } => info!(
                event = name,
                validator = %validator,
                status = %status,
                score = score,
                findings = findings,
                duration_ms = duration_ms,
            ),
        }
    }
}

/// Forwards events to an unbounded tokio channel. Send errors (receiver
/// dropped) are ignored.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<ReforgeEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReforgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &ReforgeEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Run-scoped span for a refinement run, tagged with its run_id.
///
/// Attach it with `tracing::Instrument` so the refine future stays `Send`.
pub fn refinement_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("reforge.refine", run_id = %run_id)
}
