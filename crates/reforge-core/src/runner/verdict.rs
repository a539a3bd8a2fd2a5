//! Decoding of the judge's structured verdict.
//!
//! The only recovery applied to the raw text is removal of one enclosing
//! Markdown code fence. Anything that then fails to decode, or lacks
//! `status`, `score` or `findings`, is a parse failure.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::domain::{Finding, ReforgeError, Result, Severity, ValidationStatus};

/// Decoded verdict, ready to become a `ValidationResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerdict {
    pub status: ValidationStatus,
    pub score: f64,
    pub findings: Vec<Finding>,
    pub passed_checks: Vec<String>,
    pub metrics: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawVerdict {
    status: Option<String>,
    score: Option<f64>,
    findings: Option<Vec<RawFinding>>,
    #[serde(default)]
    passed_checks: Vec<String>,
    #[serde(default)]
    metrics: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawFinding {
    id: Option<String>,
    severity: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    location: Option<String>,
    issue: Option<String>,
    recommendation: Option<String>,
    fix: Option<String>,
    #[serde(alias = "code_snippet")]
    excerpt: Option<String>,
    #[serde(default)]
    references: Vec<String>,
    impact: Option<String>,
    confidence: Option<f32>,
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| {
            Regex::new(r"(?s)\A\s*```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\s*```\s*\z").ok()
        })
        .as_ref()
}

/// Remove one enclosing code fence, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    match fence_regex()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
    {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    }
}

fn parse_error(msg: impl Into<String>) -> ReforgeError {
    ReforgeError::Parse(msg.into())
}

/// Decode `raw` into a verdict for `validator`.
pub fn parse_verdict(validator: &str, raw: &str, default_confidence: f32) -> Result<ParsedVerdict> {
    let body = strip_code_fence(raw);
    let verdict: RawVerdict =
        serde_json::from_str(body).map_err(|e| parse_error(format!("invalid JSON: {e}")))?;

    let status = verdict
        .status
        .ok_or_else(|| parse_error("missing required field: status"))?
        .parse::<ValidationStatus>()
        .map_err(|e| parse_error(e.to_string()))?;
    let score = verdict
        .score
        .ok_or_else(|| parse_error("missing required field: score"))?;
    if !(0.0..=100.0).contains(&score) {
        return Err(parse_error(format!("score {score} is outside [0, 100]")));
    }
    let raw_findings = verdict
        .findings
        .ok_or_else(|| parse_error("missing required field: findings"))?;

    let findings = raw_findings
        .into_iter()
        .enumerate()
        .map(|(i, f)| convert_finding(validator, i, f, default_confidence))
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedVerdict {
        status,
        score,
        findings,
        passed_checks: verdict.passed_checks,
        metrics: verdict.metrics,
    })
}

fn convert_finding(
    validator: &str,
    index: usize,
    raw: RawFinding,
    default_confidence: f32,
) -> Result<Finding> {
    let severity = match raw.severity {
        Some(s) => s
            .parse::<Severity>()
            .map_err(|e| parse_error(format!("finding {}: {e}", index + 1)))?,
        None => Severity::Medium,
    };

    let mut finding = Finding::new(
        raw.id
            .unwrap_or_else(|| format!("{validator}-{:03}", index + 1)),
        severity,
        raw.category.unwrap_or_else(|| "general".to_string()),
        raw.location.unwrap_or_else(|| "unspecified".to_string()),
        raw.issue.unwrap_or_else(|| "Unspecified issue".to_string()),
        raw.recommendation.unwrap_or_default(),
    )
    .with_references(raw.references)
    .with_confidence(raw.confidence.unwrap_or(default_confidence))
    .map_err(|e| parse_error(format!("finding {}: {e}", index + 1)))?;

    if let Some(sub) = raw.subcategory {
        finding = finding.with_subcategory(sub);
    }
    if let Some(fix) = raw.fix {
        finding = finding.with_fix(fix);
    }
    if let Some(excerpt) = raw.excerpt {
        finding = finding.with_excerpt(excerpt);
    }
    if let Some(impact) = raw.impact {
        finding = finding.with_impact(impact);
    }
    Ok(finding)
}
