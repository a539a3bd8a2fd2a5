//! Outcome of a single validator run.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::finding::{Finding, Severity};
use crate::domain::{ReforgeError, Result};

/// Verdict of one validator, or of a whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Pass,
    Warning,
    Fail,
}

impl ValidationStatus {
    /// Precedence used for worst-case aggregation: FAIL > WARNING > PASS.
    pub fn rank(self) -> u8 {
        match self {
            ValidationStatus::Pass => 0,
            ValidationStatus::Warning => 1,
            ValidationStatus::Fail => 2,
        }
    }

    /// The worse of two statuses.
    pub fn worst(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Pass => "PASS",
            ValidationStatus::Warning => "WARNING",
            ValidationStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = ReforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Ok(ValidationStatus::Pass),
            "WARNING" => Ok(ValidationStatus::Warning),
            "FAIL" => Ok(ValidationStatus::Fail),
            other => Err(ReforgeError::InvalidResult(format!(
                "status must be one of PASS, WARNING, FAIL (got {other:?})"
            ))),
        }
    }
}

/// Outcome of one validator run.
///
/// Produced once by the validator runner and read-only afterwards. The
/// constructors enforce the score range; consistency between `status` and
/// `score` is a property of the creation path, not of the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validator: String,
    pub status: ValidationStatus,
    /// Score in [0, 100].
    pub score: f64,
    /// Findings in discovery order.
    pub findings: Vec<Finding>,
    pub duration_ms: u64,
    /// Generation model used to judge the artifact.
    pub model: Option<String>,
    /// Estimated cost in USD.
    pub cost_usd: f64,
    pub timestamp: DateTime<Utc>,
    pub passed_checks: Vec<String>,
    pub metrics: BTreeMap<String, serde_json::Value>,
    /// Name or path of the validated artifact.
    pub target: Option<String>,
}

impl ValidationResult {
    /// Build a result with an explicit status and score.
    ///
    /// Fails when `score` is outside [0, 100] or not finite.
    pub fn new(
        validator: impl Into<String>,
        status: ValidationStatus,
        score: f64,
        findings: Vec<Finding>,
    ) -> Result<Self> {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(ReforgeError::InvalidResult(format!(
                "score {score} is outside [0, 100]"
            )));
        }
        Ok(Self::with_checked_score(validator, status, score, findings))
    }

    /// PASS with a perfect score and no findings.
    pub fn pass(validator: impl Into<String>) -> Self {
        Self::with_checked_score(validator, ValidationStatus::Pass, 100.0, Vec::new())
    }

    /// FAIL scored as `max(0, 100 - sum of severity weights)`.
    pub fn fail(validator: impl Into<String>, findings: Vec<Finding>) -> Self {
        let score = penalty_score(&findings);
        Self::with_checked_score(validator, ValidationStatus::Fail, score, findings)
    }

    /// FAIL with score 0 and a single CRITICAL `validation_error` finding.
    ///
    /// Used when the judge could not produce a usable verdict at all.
    pub fn validation_error(validator: impl Into<String>, message: impl fmt::Display) -> Self {
        let validator = validator.into();
        let finding = Finding::new(
            format!("{validator}-validation-error"),
            Severity::Critical,
            "validation_error",
            "validator",
            format!("Validation could not be completed: {message}"),
            "Check the validator configuration and the generation service, then re-run validation",
        )
        .with_impact("The artifact was not judged; its quality is unknown");
        Self::with_checked_score(validator, ValidationStatus::Fail, 0.0, vec![finding])
    }

    fn with_checked_score(
        validator: impl Into<String>,
        status: ValidationStatus,
        score: f64,
        findings: Vec<Finding>,
    ) -> Self {
        Self {
            validator: validator.into(),
            status,
            score,
            findings,
            duration_ms: 0,
            model: None,
            cost_usd: 0.0,
            timestamp: Utc::now(),
            passed_checks: Vec::new(),
            metrics: BTreeMap::new(),
            target: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_passed_checks(mut self, checks: Vec<String>) -> Self {
        self.passed_checks = checks;
        self
    }

    pub fn with_metrics(mut self, metrics: BTreeMap<String, serde_json::Value>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn has_critical_findings(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.severity == Severity::Critical)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Findings at or above `severity`, in discovery order.
    pub fn findings_at_or_above(&self, severity: Severity) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity >= severity)
            .collect()
    }
}

/// `max(0, 100 - sum of weights)` over `findings`.
pub fn penalty_score(findings: &[Finding]) -> f64 {
    let penalty: u32 = findings.iter().map(|f| f.severity.weight()).sum();
    100u32.saturating_sub(penalty) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding::new("f", severity, "cat", "loc", "issue", "rec")
    }

    #[test]
    fn pass_result_is_perfect() {
        let r = ValidationResult::pass("code");
        assert_eq!(r.status, ValidationStatus::Pass);
        assert_eq!(r.score, 100.0);
        assert!(r.findings.is_empty());
    }

    #[test]
    fn fail_result_subtracts_weights() {
        let r = ValidationResult::fail(
            "code",
            vec![finding(Severity::Critical), finding(Severity::Medium)],
        );
        assert_eq!(r.status, ValidationStatus::Fail);
        assert_eq!(r.score, 75.0);
    }

    #[test]
    fn fail_result_floors_at_zero() {
        let findings = (0..6).map(|_| finding(Severity::Critical)).collect();
        let r = ValidationResult::fail("code", findings);
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn new_rejects_out_of_range_score() {
        assert!(ValidationResult::new("x", ValidationStatus::Pass, 101.0, vec![]).is_err());
        assert!(ValidationResult::new("x", ValidationStatus::Pass, -1.0, vec![]).is_err());
        assert!(ValidationResult::new("x", ValidationStatus::Pass, f64::NAN, vec![]).is_err());
        assert!(ValidationResult::new("x", ValidationStatus::Warning, 0.0, vec![]).is_ok());
    }

    #[test]
    fn status_parsing_rejects_unknown() {
        assert_eq!(
            "pass".parse::<ValidationStatus>().unwrap(),
            ValidationStatus::Pass
        );
        assert!("SKIPPED".parse::<ValidationStatus>().is_err());
    }

    #[test]
    fn worst_status_precedence() {
        use ValidationStatus::*;
        assert_eq!(Pass.worst(Warning), Warning);
        assert_eq!(Warning.worst(Fail), Fail);
        assert_eq!(Fail.worst(Pass), Fail);
        assert_eq!(Pass.worst(Pass), Pass);
    }

    #[test]
    fn validation_error_result_shape() {
        let r = ValidationResult::validation_error("docs", "connection refused");
        assert_eq!(r.status, ValidationStatus::Fail);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.findings.len(), 1);
        assert_eq!(r.findings[0].category, "validation_error");
        assert!(r.has_critical_findings());
        assert!(r.findings[0].issue.contains("connection refused"));
    }

    #[test]
    fn findings_at_or_above_keeps_order() {
        let r = ValidationResult::fail(
            "code",
            vec![
                Finding::new("a", Severity::Low, "c", "l", "i", "r"),
                Finding::new("b", Severity::High, "c", "l", "i", "r"),
                Finding::new("c", Severity::Critical, "c", "l", "i", "r"),
            ],
        );
        let ids: Vec<&str> = r
            .findings_at_or_above(Severity::High)
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(r.count_by_severity(Severity::Low), 1);
    }
}
