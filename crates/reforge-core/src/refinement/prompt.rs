//! Regeneration prompt construction.

use crate::domain::{FeedbackItem, InputMap, ValidationReport};

/// Keys the loop adds to the generator input between iterations.
pub const PREVIOUS_ATTEMPT_KEY: &str = "previous_attempt";
pub const VALIDATION_FEEDBACK_KEY: &str = "validation_feedback";
pub const REGENERATION_PROMPT_KEY: &str = "regeneration_prompt";

const INSTRUCTIONS: &str = "\
## Instructions
1. Address every CRITICAL and HIGH issue listed above.
2. Preserve all functionality that already works.
3. Do not introduce regressions or new issues.
4. Return the complete revised artifact, not a diff.";

/// The caller's task as text: `task`, else `prompt`, else the whole input as
/// JSON (without loop-added keys).
pub fn original_task(input: &InputMap) -> String {
    for key in ["task", "prompt"] {
        if let Some(text) = input.get(key).and_then(|v| v.as_str()) {
            if !text.trim().is_empty() {
                return text.to_string();
            }
        }
    }
    let stripped: InputMap = input
        .iter()
        .filter(|(k, _)| {
            ![PREVIOUS_ATTEMPT_KEY, VALIDATION_FEEDBACK_KEY, REGENERATION_PROMPT_KEY]
                .contains(&k.as_str())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    serde_json::Value::Object(stripped).to_string()
}

/// Build the prompt for the next generation attempt.
///
/// A non-empty `narrative` from structured extraction is used as-is, wrapped
/// with the original task. Otherwise the prompt lists the previous verdict,
/// the numbered feedback and a fixed instruction block.
pub fn build_regeneration_prompt(
    input: &InputMap,
    artifact: &str,
    report: &ValidationReport,
    feedback: &[FeedbackItem],
    narrative: Option<&str>,
) -> String {
    let task = original_task(input);

    if let Some(narrative) = narrative.map(str::trim).filter(|n| !n.is_empty()) {
        return format!(
            "## Original task\n{task}\n\n## Required changes\n{narrative}\n\n{INSTRUCTIONS}\n"
        );
    }

    let mut prompt = String::new();
    prompt.push_str(&format!("## Original task\n{task}\n\n"));
    prompt.push_str(&format!("## Previous attempt\n```\n{artifact}\n```\n\n"));
    prompt.push_str(&format!(
        "## Validation result\nStatus: {}\nScore: {:.1}\nCritical issues: {}\nHigh issues: {}\n\n",
        report.overall_status(),
        report.average_score(),
        report.critical_count(),
        report.high_count()
    ));
    prompt.push_str("## Issues to fix\n");
    for (n, item) in feedback.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. [{}] {} ({}): {}\n   Action: {}\n",
            n + 1,
            item.priority,
            item.category,
            item.location,
            item.issue,
            item.action
        ));
    }
    prompt.push_str(&format!("\n{INSTRUCTIONS}\n"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Finding, Severity, ValidationResult, ValidationStatus};
    use serde_json::json;

    fn failing_report() -> ValidationReport {
        let finding = Finding::new("c1", Severity::Critical, "security", "line 3", "eval of input", "remove eval");
        ValidationReport::from_results([ValidationResult::fail("code", vec![finding])])
    }

    fn item() -> FeedbackItem {
        FeedbackItem {
            priority: Severity::Critical,
            validator: Some("code".to_string()),
            category: "security".to_string(),
            location: "line 3".to_string(),
            issue: "eval of input".to_string(),
            action: "remove eval".to_string(),
        }
    }

    #[test]
    fn task_prefers_task_then_prompt_then_json() {
        let mut input = InputMap::new();
        input.insert("prompt".to_string(), json!("from prompt"));
        assert_eq!(original_task(&input), "from prompt");
        input.insert("task".to_string(), json!("from task"));
        assert_eq!(original_task(&input), "from task");

        let mut input = InputMap::new();
        input.insert("requirements".to_string(), json!({"n": 1}));
        input.insert(PREVIOUS_ATTEMPT_KEY.to_string(), json!("old"));
        let task = original_task(&input);
        assert!(task.contains("\"requirements\""));
        assert!(!task.contains("old"));
    }

    #[test]
    fn manual_prompt_lists_numbered_feedback() {
        let mut input = InputMap::new();
        input.insert("task".to_string(), json!("write a parser"));
        let prompt = build_regeneration_prompt(&input, "fn parse() {}", &failing_report(), &[item()], None);

        assert!(prompt.contains("write a parser"));
        assert!(prompt.contains("fn parse() {}"));
        assert!(prompt.contains("Status: FAIL"));
        assert!(prompt.contains("Critical issues: 1"));
        assert!(prompt.contains("1. [CRITICAL] security (line 3): eval of input"));
        assert!(prompt.contains("Preserve all functionality"));
    }

    #[test]
    fn narrative_wins_when_present() {
        let mut input = InputMap::new();
        input.insert("task".to_string(), json!("write a parser"));
        let prompt = build_regeneration_prompt(
            &input,
            "fn parse() {}",
            &failing_report(),
            &[item()],
            Some("Drop eval and use a tokenizer."),
        );
        assert!(prompt.contains("write a parser"));
        assert!(prompt.contains("Drop eval and use a tokenizer."));
        assert!(!prompt.contains("1. [CRITICAL]"));

        let blank = build_regeneration_prompt(&input, "x", &failing_report(), &[item()], Some("  "));
        assert!(blank.contains("1. [CRITICAL]"));
    }
}
