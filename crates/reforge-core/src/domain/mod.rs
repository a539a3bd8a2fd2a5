//! Domain models for Reforge.
//!
//! Canonical definitions for the shared vocabulary:
//! - `Finding`: one discovered issue, with a `Severity`
//! - `ValidationResult`: the outcome of one validator run
//! - `ValidationReport`: the combined verdict over several results
//! - `RefinementIteration` / `RefinementResult`: the refinement loop history

pub mod error;
pub mod finding;
pub mod level;
pub mod refinement;
pub mod report;
pub mod result;

pub use error::{ReforgeError, Result};
pub use finding::{Finding, Severity};
pub use level::ValidationLevel;
pub use refinement::{
    FeedbackItem, InputMap, RefinementIteration, RefinementOutcome, RefinementResult,
};
pub use report::{SeverityCounts, ValidationReport};
pub use result::{penalty_score, ValidationResult, ValidationStatus};
