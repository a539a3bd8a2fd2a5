//! Aggregation of validator results into a single verdict.
//!
//! A [`ValidationReport`] is keyed by validator name and every derived field
//! (overall status, severity totals, cost, duration, recommendations) is
//! recomputed from that map at construction. There is no incremental update
//! path, and deserialization goes through the same recomputation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::finding::{Finding, Severity};
use crate::domain::result::{ValidationResult, ValidationStatus};

/// HIGH findings surfaced per validator in the recommendation list.
const HIGH_RECOMMENDATIONS_PER_VALIDATOR: usize = 3;

/// Finding totals per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Serialized shape read back from audit documents. Only `results` is
/// trusted; everything else is recomputed.
#[derive(Deserialize)]
struct ReportRecord {
    results: BTreeMap<String, ValidationResult>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl From<ReportRecord> for ValidationReport {
    fn from(record: ReportRecord) -> Self {
        let mut report = ValidationReport::new(record.results);
        report.created_at = record.created_at;
        report
    }
}

/// Combined verdict over one or more validator results.
///
/// # Invariants
///
/// `results` keys are unique validator names. Iteration over `results` is in
/// ascending name order, which is the order used for recommendations and
/// finding listings, so aggregation never depends on completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ReportRecord")]
pub struct ValidationReport {
    results: BTreeMap<String, ValidationResult>,
    overall_status: ValidationStatus,
    average_score: f64,
    severity_counts: SeverityCounts,
    total_cost_usd: f64,
    total_duration_ms: u64,
    recommendations: Vec<String>,
    created_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Build a report and compute every derived field from `results`.
    pub fn new(results: BTreeMap<String, ValidationResult>) -> Self {
        let overall_status = results
            .values()
            .fold(ValidationStatus::Pass, |acc, r| acc.worst(r.status));

        let average_score = if results.is_empty() {
            0.0
        } else {
            results.values().map(|r| r.score).sum::<f64>() / results.len() as f64
        };

        let mut severity_counts = SeverityCounts::default();
        for finding in results.values().flat_map(|r| r.findings.iter()) {
            severity_counts.add(finding.severity);
        }

        let total_cost_usd = results.values().map(|r| r.cost_usd).sum();
        let total_duration_ms = results.values().map(|r| r.duration_ms).sum();
        let recommendations = build_recommendations(&results);

        Self {
            results,
            overall_status,
            average_score,
            severity_counts,
            total_cost_usd,
            total_duration_ms,
            recommendations,
            created_at: Utc::now(),
        }
    }

    /// Key results by their validator name. A later result for the same
    /// validator replaces an earlier one.
    pub fn from_results(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        Self::new(
            results
                .into_iter()
                .map(|r| (r.validator.clone(), r))
                .collect(),
        )
    }

    pub fn results(&self) -> &BTreeMap<String, ValidationResult> {
        &self.results
    }

    pub fn result(&self, validator: &str) -> Option<&ValidationResult> {
        self.results.get(validator)
    }

    pub fn overall_status(&self) -> ValidationStatus {
        self.overall_status
    }

    /// Arithmetic mean of member scores; 0.0 for an empty report.
    pub fn average_score(&self) -> f64 {
        self.average_score
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        self.severity_counts
    }

    pub fn critical_count(&self) -> usize {
        self.severity_counts.critical
    }

    pub fn high_count(&self) -> usize {
        self.severity_counts.high
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_usd
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn passed(&self) -> bool {
        self.overall_status == ValidationStatus::Pass
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Names of validators whose status is FAIL.
    pub fn failed_validators(&self) -> Vec<&str> {
        self.results
            .values()
            .filter(|r| r.status == ValidationStatus::Fail)
            .map(|r| r.validator.as_str())
            .collect()
    }

    /// Every finding paired with its validator, in validator order.
    pub fn all_findings(&self) -> impl Iterator<Item = (&str, &Finding)> {
        self.results
            .iter()
            .flat_map(|(name, r)| r.findings.iter().map(move |f| (name.as_str(), f)))
    }

    /// Findings of exactly `severity`, in validator order.
    pub fn findings_with_severity(&self, severity: Severity) -> Vec<(&str, &Finding)> {
        self.all_findings()
            .filter(|(_, f)| f.severity == severity)
            .collect()
    }
}

fn recommendation_line(validator: &str, finding: &Finding) -> String {
    let mut line = format!(
        "[{}] {}: {} ({})",
        finding.severity, validator, finding.issue, finding.location
    );
    if !finding.recommendation.is_empty() {
        line.push_str(&format!(". {}", finding.recommendation));
    }
    line
}

/// All CRITICAL findings across validators, then up to three HIGH findings
/// from each validator.
fn build_recommendations(results: &BTreeMap<String, ValidationResult>) -> Vec<String> {
    let mut out = Vec::new();

    for (name, result) in results {
        for finding in result
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
        {
            out.push(recommendation_line(name, finding));
        }
    }

    for (name, result) in results {
        for finding in result
            .findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .take(HIGH_RECOMMENDATIONS_PER_VALIDATOR)
        {
            out.push(recommendation_line(name, finding));
        }
    }

    out
}
