//! Records produced by the refinement loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::finding::Severity;
use crate::domain::report::ValidationReport;

/// Input handed to a generator: the caller's task fields plus, after the
/// first iteration, `previous_attempt`, `validation_feedback` and
/// `regeneration_prompt`.
pub type InputMap = serde_json::Map<String, serde_json::Value>;

/// One prioritized instruction for the next generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub priority: Severity,
    /// Validator the item came from, when known.
    pub validator: Option<String>,
    pub category: String,
    pub location: String,
    pub issue: String,
    /// What to change.
    pub action: String,
}

/// Terminal state of a refinement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementOutcome {
    /// The artifact met the convergence criteria.
    Converged,
    /// The iteration budget ran out first.
    Exhausted,
    /// Generation or validation raised an error.
    Errored,
    /// The cancellation token fired at an iteration boundary.
    Cancelled,
}

/// One generate / validate / feedback cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementIteration {
    /// 1-based.
    pub iteration: u32,
    pub artifact: String,
    pub report: ValidationReport,
    pub feedback: Vec<FeedbackItem>,
    /// Prompt built for the following cycle.
    pub regeneration_prompt: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub cost_usd: f64,
}

/// Final outcome of a refinement run. Built once when the loop stops.
///
/// # Invariants
///
/// `success == converged == (outcome == Converged)`. When `success` is false,
/// either `error` is set or `final_report` is present with a non-PASS status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementResult {
    pub run_id: String,
    pub success: bool,
    pub outcome: RefinementOutcome,
    pub final_artifact: Option<String>,
    pub final_report: Option<ValidationReport>,
    pub iterations: Vec<RefinementIteration>,
    pub total_iterations: u32,
    pub converged: bool,
    pub started_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub total_cost_usd: f64,
    pub error: Option<String>,
}

impl RefinementResult {
    /// Average score of the final report, if any iteration completed.
    pub fn final_score(&self) -> Option<f64> {
        self.final_report.as_ref().map(|r| r.average_score())
    }

    /// Highest average score reached by any iteration.
    pub fn best_score(&self) -> Option<f64> {
        self.iterations
            .iter()
            .map(|i| i.report.average_score())
            .fold(None, |best, s| match best {
                Some(b) if b >= s => Some(b),
                _ => Some(s),
            })
    }

    /// Short human-readable reason for the outcome.
    pub fn summary(&self) -> String {
        match self.outcome {
            RefinementOutcome::Converged => format!(
                "converged after {} iteration(s) with score {:.1}",
                self.total_iterations,
                self.final_score().unwrap_or_default()
            ),
            _ => self
                .error
                .clone()
                .unwrap_or_else(|| format!("stopped after {} iteration(s)", self.total_iterations)),
        }
    }
}
