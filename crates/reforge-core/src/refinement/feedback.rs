//! Feedback extraction strategies.
//!
//! [`manual_feedback`] is the always-available heuristic. An optional
//! [`FeedbackExtractor`] (normally [`LlmFeedbackExtractor`]) can be attached
//! to the loop; when it fails the loop falls back to the heuristic.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{FeedbackItem, Finding, ReforgeError, Result, Severity, ValidationReport};
use crate::llm::{GenerationRequest, TextGenerator};
use crate::runner::strip_code_fence;

const MANUAL_HIGH_LIMIT: usize = 5;
const MANUAL_MEDIUM_LIMIT: usize = 3;

/// Default cap on structured feedback items.
pub const MAX_STRUCTURED_ITEMS: usize = 10;

/// Everything an extractor may look at.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackRequest<'a> {
    pub report: &'a ValidationReport,
    pub artifact: &'a str,
    /// Original task text.
    pub task: &'a str,
    pub max_items: usize,
}

/// Prioritized items plus an optional ready-made regeneration narrative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackExtraction {
    pub items: Vec<FeedbackItem>,
    pub regeneration_prompt: Option<String>,
}

#[async_trait]
pub trait FeedbackExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, request: FeedbackRequest<'_>) -> Result<FeedbackExtraction>;
}

fn item_from_finding(validator: &str, finding: &Finding) -> FeedbackItem {
    let action = if !finding.recommendation.trim().is_empty() {
        finding.recommendation.clone()
    } else if let Some(fix) = finding.fix.as_deref() {
        format!("Apply fix: {fix}")
    } else {
        "Resolve this issue".to_string()
    };
    FeedbackItem {
        priority: finding.severity,
        validator: Some(validator.to_string()),
        category: finding.category.clone(),
        location: finding.location.clone(),
        issue: finding.issue.clone(),
        action,
    }
}

/// Heuristic extraction. Never returns an empty list.
///
/// All CRITICAL findings, then up to 5 HIGH; if that yields nothing, up to 3
/// MEDIUM; if still nothing, one generic item.
pub fn manual_feedback(report: &ValidationReport) -> Vec<FeedbackItem> {
    let mut items: Vec<FeedbackItem> = report
        .findings_with_severity(Severity::Critical)
        .into_iter()
        .map(|(v, f)| item_from_finding(v, f))
        .collect();

    items.extend(
        report
            .findings_with_severity(Severity::High)
            .into_iter()
            .take(MANUAL_HIGH_LIMIT)
            .map(|(v, f)| item_from_finding(v, f)),
    );

    if items.is_empty() {
        items.extend(
            report
                .findings_with_severity(Severity::Medium)
                .into_iter()
                .take(MANUAL_MEDIUM_LIMIT)
                .map(|(v, f)| item_from_finding(v, f)),
        );
    }

    if items.is_empty() {
        items.push(FeedbackItem {
            priority: Severity::Medium,
            validator: None,
            category: "quality".to_string(),
            location: "overall".to_string(),
            issue: format!(
                "Quality threshold not met (status {}, average score {:.1})",
                report.overall_status(),
                report.average_score()
            ),
            action: "Improve overall quality and completeness".to_string(),
        });
    }
    items
}

/// [`manual_feedback`] as a [`FeedbackExtractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualFeedbackExtractor;

#[async_trait]
impl FeedbackExtractor for ManualFeedbackExtractor {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn extract(&self, request: FeedbackRequest<'_>) -> Result<FeedbackExtraction> {
        Ok(FeedbackExtraction {
            items: manual_feedback(request.report),
            regeneration_prompt: None,
        })
    }
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    feedback: Vec<RawItem>,
    regeneration_prompt: Option<String>,
}

#[derive(Deserialize)]
struct RawItem {
    priority: Option<String>,
    validator: Option<String>,
    category: Option<String>,
    location: Option<String>,
    issue: Option<String>,
    #[serde(alias = "fix")]
    action: Option<String>,
}

/// Asks a text generator to turn a report into prioritized feedback.
pub struct LlmFeedbackExtractor {
    generator: Arc<dyn TextGenerator>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmFeedbackExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 2048,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn prompt(&self, request: &FeedbackRequest<'_>) -> String {
        let findings: Vec<String> = request
            .report
            .all_findings()
            .map(|(v, f)| {
                format!(
                    "- [{}] {v} / {} at {}: {} (recommendation: {})",
                    f.severity, f.category, f.location, f.issue, f.recommendation
                )
            })
            .collect();
        let findings = if findings.is_empty() {
            "(no findings reported)".to_string()
        } else {
            findings.join("\n")
        };

        format!(
            "You are reviewing a failed validation of generated content.\n\n\
             ## Original task\n{task}\n\n\
             ## Artifact\n```\n{artifact}\n```\n\n\
             ## Validation summary\nStatus: {status}\nAverage score: {score:.1}\n\
             Critical: {critical}, High: {high}\n\n\
             ## Findings\n{findings}\n\n\
             Return ONLY a JSON object of the form:\n\
             {{\"feedback\": [{{\"priority\": \"CRITICAL|HIGH|MEDIUM|LOW|INFO\", \"validator\": \"...\", \
             \"category\": \"...\", \"location\": \"...\", \"issue\": \"...\", \"action\": \"...\"}}], \
             \"regeneration_prompt\": \"...\"}}\n\
             List at most {max} items, most important first. The regeneration_prompt must tell \
             the author exactly what to change.",
            task = request.task,
            artifact = request.artifact,
            status = request.report.overall_status(),
            score = request.report.average_score(),
            critical = request.report.critical_count(),
            high = request.report.high_count(),
            max = request.max_items,
        )
    }
}

/// Decode a structured feedback response. An empty item list is an error.
pub fn parse_feedback(raw: &str, max_items: usize) -> Result<FeedbackExtraction> {
    let decoded: RawExtraction = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| ReforgeError::Parse(format!("invalid feedback JSON: {e}")))?;

    let mut items = Vec::new();
    for raw_item in decoded.feedback {
        let Some(issue) = raw_item.issue.filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        let priority = match raw_item.priority {
            Some(p) => p.parse::<Severity>()?,
            None => Severity::Medium,
        };
        items.push(FeedbackItem {
            priority,
            validator: raw_item.validator,
            category: raw_item.category.unwrap_or_else(|| "general".to_string()),
            location: raw_item.location.unwrap_or_else(|| "unspecified".to_string()),
            action: raw_item
                .action
                .unwrap_or_else(|| "Resolve this issue".to_string()),
            issue,
        });
        if items.len() == max_items {
            break;
        }
    }

    if items.is_empty() {
        return Err(ReforgeError::Parse(
            "structured feedback contained no items".to_string(),
        ));
    }
    Ok(FeedbackExtraction {
        items,
        regeneration_prompt: decoded
            .regeneration_prompt
            .filter(|p| !p.trim().is_empty()),
    })
}

#[async_trait]
impl FeedbackExtractor for LlmFeedbackExtractor {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(&self, request: FeedbackRequest<'_>) -> Result<FeedbackExtraction> {
        let generation = GenerationRequest::new(self.prompt(&request), &self.model)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let response = self.generator.generate(&generation).await?;
        let extraction = parse_feedback(&response, request.max_items)?;
        debug!(items = extraction.items.len(), "structured feedback extracted");
        Ok(extraction)
    }
}
