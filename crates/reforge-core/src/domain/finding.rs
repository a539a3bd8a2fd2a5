//! Findings: one discrete issue discovered by a validator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{ReforgeError, Result};

/// Finding severity.
///
/// Variants are declared in ascending order so that `Critical` compares
/// greatest; sorting by severity never consults [`Severity::weight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Score penalty applied per finding when a fail score is synthesized.
    pub fn weight(self) -> u32 {
        match self {
            Severity::Critical => 20,
            Severity::High => 10,
            Severity::Medium => 5,
            Severity::Low => 2,
            Severity::Info => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ReforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(ReforgeError::InvalidFinding(format!(
                "unknown severity: {other}"
            ))),
        }
    }
}

/// One discovered issue.
///
/// Findings are immutable once built; the builder methods consume `self`.
/// Confidence is only reachable through checked paths, including serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FindingRecord")]
pub struct Finding {
    /// Stable identifier, unique within the producing result.
    pub id: String,
    pub severity: Severity,
    pub category: String,
    pub subcategory: Option<String>,
    /// Human-readable position in the artifact.
    pub location: String,
    pub issue: String,
    pub recommendation: String,
    /// Machine-applicable fix text.
    pub fix: Option<String>,
    /// Code or context excerpt.
    pub excerpt: Option<String>,
    pub references: Vec<String>,
    pub impact: Option<String>,
    /// Confidence in [0.0, 1.0].
    confidence: f32,
}

/// Wire form of a [`Finding`], checked on the way in.
#[derive(Deserialize)]
struct FindingRecord {
    id: String,
    severity: Severity,
    category: String,
    subcategory: Option<String>,
    location: String,
    issue: String,
    recommendation: String,
    fix: Option<String>,
    excerpt: Option<String>,
    references: Vec<String>,
    impact: Option<String>,
    confidence: f32,
}

impl TryFrom<FindingRecord> for Finding {
    type Error = ReforgeError;

    fn try_from(r: FindingRecord) -> Result<Self> {
        let finding = Finding {
            id: r.id,
            severity: r.severity,
            category: r.category,
            subcategory: r.subcategory,
            location: r.location,
            issue: r.issue,
            recommendation: r.recommendation,
            fix: r.fix,
            excerpt: r.excerpt,
            references: r.references,
            impact: r.impact,
            confidence: Self::DEFAULT_CONFIDENCE,
        };
        finding.with_confidence(r.confidence)
    }
}

impl Finding {
    /// Default confidence for findings that do not state one.
    pub const DEFAULT_CONFIDENCE: f32 = 0.9;

    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
        location: impl Into<String>,
        issue: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            category: category.into(),
            subcategory: None,
            location: location.into(),
            issue: issue.into(),
            recommendation: recommendation.into(),
            fix: None,
            excerpt: None,
            references: Vec::new(),
            impact: None,
            confidence: Self::DEFAULT_CONFIDENCE,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Set the confidence. Fails when `confidence` is outside [0, 1].
    pub fn with_confidence(mut self, confidence: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ReforgeError::InvalidFinding(format!(
                "confidence {confidence} is outside [0, 1]"
            )));
        }
        self.confidence = confidence;
        Ok(self)
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_highest() {
        let mut sevs = vec![
            Severity::Low,
            Severity::Critical,
            Severity::Info,
            Severity::High,
            Severity::Medium,
        ];
        sevs.sort_by(|a, b| b.cmp(a));
        assert_eq!(sevs, Severity::ALL.to_vec());
    }

    #[test]
    fn severity_weights() {
        let weights: Vec<u32> = Severity::ALL.iter().map(|s| s.weight()).collect();
        assert_eq!(weights, vec![20, 10, 5, 2, 1]);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" High ".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("INFO".parse::<Severity>().unwrap(), Severity::Info);
        assert!("blocker".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_serializes_screaming() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }

    #[test]
    fn confidence_must_be_in_unit_interval() {
        let f = Finding::new("f1", Severity::Low, "style", "line 1", "issue", "fix it");
        assert_eq!(f.confidence(), Finding::DEFAULT_CONFIDENCE);
        assert!(f.clone().with_confidence(0.5).is_ok());
        assert!(f.clone().with_confidence(1.5).is_err());
        assert!(f.with_confidence(-0.1).is_err());
    }

    #[test]
    fn deserialize_rejects_out_of_range_confidence() {
        let f = Finding::new("f1", Severity::High, "logic", "line 4", "off by one", "use <")
            .with_confidence(0.7)
            .unwrap();
        let mut value = serde_json::to_value(&f).unwrap();
        let back: Finding = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(back, f);

        value["confidence"] = serde_json::json!(3.0);
        let err = serde_json::from_value::<Finding>(value).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
    }
}
