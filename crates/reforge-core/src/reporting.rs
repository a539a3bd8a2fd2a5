use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::{RefinementResult, Severity, ValidationReport};

/// Render a Markdown summary of a validation report.
pub fn render_report_md(report: &ValidationReport) -> String {
    let counts = report.severity_counts();
    let mut out = String::new();
    out.push_str("# Validation Report\n\n");
    out.push_str(&format!(
        "- status: {}\n- average score: {:.1}\n- validators: {}\n- cost: ${:.4}\n- duration: {} ms\n\n",
        report.overall_status(),
        report.average_score(),
        report.results().len(),
        report.total_cost_usd(),
        report.total_duration_ms()
    ));

    out.push_str("## Findings\n");
    for severity in Severity::ALL {
        out.push_str(&format!("- {}: {}\n", severity, counts.get(severity)));
    }
    out.push('\n');

    out.push_str("## Validators\n");
    out.push_str("| validator | status | score | findings |\n|---|---|---|---|\n");
    for (name, result) in report.results() {
        out.push_str(&format!(
            "| `{}` | {} | {:.1} | {} |\n",
            name,
            result.status,
            result.score,
            result.findings.len()
        ));
    }

    if !report.recommendations().is_empty() {
        out.push_str("\n## Recommendations\n");
        for rec in report.recommendations() {
            out.push_str(&format!("- {}\n", rec));
        }
    }
    out
}

/// Render a Markdown summary of a refinement run.
pub fn render_refinement_md(result: &RefinementResult) -> String {
    let mut out = String::new();
    out.push_str("# Refinement Run\n\n");
    out.push_str(&format!(
        "- run: `{}`\n- outcome: {:?}\n- iterations: {}\n- cost: ${:.4}\n- duration: {} ms\n",
        result.run_id,
        result.outcome,
        result.total_iterations,
        result.total_cost_usd,
        result.total_duration_ms
    ));
    out.push_str(&format!("- summary: {}\n\n", result.summary()));

    if !result.iterations.is_empty() {
        out.push_str("## Iterations\n");
        out.push_str("| # | status | score | critical | feedback items |\n|---|---|---|---|---|\n");
        for it in &result.iterations {
            out.push_str(&format!(
                "| {} | {} | {:.1} | {} | {} |\n",
                it.iteration,
                it.report.overall_status(),
                it.report.average_score(),
                it.report.critical_count(),
                it.feedback.len()
            ));
        }
    }
    out
}

/// Write a report summary as Markdown.
pub fn write_report_md(path: &Path, report: &ValidationReport) -> Result<()> {
    let md = render_report_md(report);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Finding, RefinementOutcome, ValidationResult, ValidationStatus};

    #[test]
    fn report_markdown_lists_validators_and_recommendations() {
        let finding = Finding::new(
            "c1",
            Severity::Critical,
            "security",
            "line 2",
            "hardcoded secret",
            "load it from the environment",
        );
        let report = ValidationReport::from_results([
            ValidationResult::pass("documentation"),
            ValidationResult::new("code", ValidationStatus::Fail, 40.0, vec![finding]).unwrap(),
        ]);

        let md = render_report_md(&report);
        assert!(md.starts_with("# Validation Report\n\n- status: FAIL\n- average score: 70.0\n"));
        assert!(md.contains("- CRITICAL: 1\n"));
        assert!(md.contains("| `code` | FAIL | 40.0 | 1 |\n| `documentation` | PASS | 100.0 | 0 |\n"));
        assert!(md.contains("## Recommendations\n- [CRITICAL] code: hardcoded secret"));
    }

    #[test]
    fn empty_report_has_no_recommendation_section() {
        let md = render_report_md(&ValidationReport::from_results(Vec::new()));
        assert!(md.contains("- average score: 0.0\n"));
        assert!(!md.contains("## Recommendations"));
    }

    #[test]
    fn refinement_markdown_states_why_the_run_stopped() {
        let result = RefinementResult {
            run_id: "run-1".to_string(),
            success: false,
            outcome: RefinementOutcome::Errored,
            final_artifact: None,
            final_report: None,
            iterations: Vec::new(),
            total_iterations: 1,
            converged: false,
            started_at: chrono::Utc::now(),
            total_duration_ms: 12,
            total_cost_usd: 0.0,
            error: Some("generation failed on iteration 1: timeout".to_string()),
        };

        let md = render_refinement_md(&result);
        assert!(md.contains("- run: `run-1`\n"));
        assert!(md.contains("- summary: generation failed on iteration 1: timeout\n"));
        assert!(!md.contains("## Iterations"));
    }

    #[test]
    fn report_markdown_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let report = ValidationReport::from_results([ValidationResult::pass("code")]);

        write_report_md(&path, &report).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_report_md(&report));
        assert!(write_report_md(&dir.path().join("missing/report.md"), &report).is_err());
    }
}
