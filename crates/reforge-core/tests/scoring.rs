use reforge_core::{
    penalty_score, Finding, ReforgeError, Severity, ValidationReport, ValidationResult,
    ValidationStatus,
};

fn finding(id: &str, severity: Severity) -> Finding {
    Finding::new(id, severity, "general", "line 1", format!("issue {id}"), "fix")
}

fn result(name: &str, status: ValidationStatus, score: f64) -> ValidationResult {
    ValidationResult::new(name, status, score, Vec::new()).unwrap()
}

#[test]
fn fail_score_is_floored_penalty() {
    let cases: Vec<(Vec<Severity>, f64)> = vec![
        (vec![], 100.0),
        (vec![Severity::Info], 99.0),
        (vec![Severity::Critical, Severity::High], 70.0),
        (vec![Severity::Medium, Severity::Low, Severity::Info], 92.0),
        (vec![Severity::Critical; 5], 0.0),
        (vec![Severity::Critical; 9], 0.0),
    ];
    for (severities, expected) in cases {
        let findings: Vec<Finding> = severities
            .iter()
            .enumerate()
            .map(|(i, s)| finding(&i.to_string(), *s))
            .collect();
        let r = ValidationResult::fail("code", findings.clone());
        assert_eq!(r.status, ValidationStatus::Fail);
        assert_eq!(r.score, expected, "{severities:?}");
        assert_eq!(penalty_score(&findings), expected);
        assert!(r.score >= 0.0);
    }
}

#[test]
fn pass_result_is_perfect() {
    let r = ValidationResult::pass("docs");
    assert_eq!(r.status, ValidationStatus::Pass);
    assert_eq!(r.score, 100.0);
    assert!(r.findings.is_empty());
}

#[test]
fn result_rejects_out_of_range_scores() {
    for bad in [-0.1, 100.1, f64::NAN, f64::INFINITY] {
        let err = ValidationResult::new("code", ValidationStatus::Pass, bad, Vec::new()).unwrap_err();
        assert!(matches!(err, ReforgeError::InvalidResult(_)), "{bad}");
    }
    assert!("UNKNOWN".parse::<ValidationStatus>().is_err());
}

#[test]
fn worst_case_aggregation() {
    use ValidationStatus::*;
    let combos = [
        (vec![Pass, Pass], Pass),
        (vec![Pass, Warning], Warning),
        (vec![Warning, Fail, Pass], Fail),
        (vec![Fail], Fail),
        (vec![Warning, Warning], Warning),
    ];
    for (statuses, expected) in combos {
        let report = ValidationReport::from_results(
            statuses
                .iter()
                .enumerate()
                .map(|(i, s)| result(&format!("v{i}"), *s, 50.0)),
        );
        assert_eq!(report.overall_status(), expected, "{statuses:?}");
    }
}

#[test]
fn empty_report_is_safe() {
    let report = ValidationReport::from_results(Vec::new());
    assert_eq!(report.average_score(), 0.0);
    assert_eq!(report.overall_status(), ValidationStatus::Pass);
    assert!(report.is_empty());
    assert!(report.recommendations().is_empty());
}

#[test]
fn scenario_b_pass_and_warning_average() {
    let report = ValidationReport::from_results([
        result("code", ValidationStatus::Pass, 90.0),
        result("documentation", ValidationStatus::Warning, 70.0),
    ]);
    assert_eq!(report.overall_status(), ValidationStatus::Warning);
    assert_eq!(report.average_score(), 80.0);
    assert!(!report.passed());
}

#[test]
fn report_totals_and_recommendation_order() {
    let code = ValidationResult::new(
        "code",
        ValidationStatus::Fail,
        30.0,
        vec![
            finding("h1", Severity::High),
            finding("c1", Severity::Critical),
            finding("h2", Severity::High),
            finding("h3", Severity::High),
            finding("h4", Severity::High),
        ],
    )
    .unwrap()
    .with_cost(0.01)
    .with_duration_ms(100);
    let docs = ValidationResult::new(
        "documentation",
        ValidationStatus::Warning,
        75.0,
        vec![finding("c2", Severity::Critical), finding("m1", Severity::Medium)],
    )
    .unwrap()
    .with_cost(0.02)
    .with_duration_ms(50);

    let report = ValidationReport::from_results([docs, code]);
    assert_eq!(report.critical_count(), 2);
    assert_eq!(report.high_count(), 4);
    assert_eq!(report.severity_counts().medium, 1);
    assert_eq!(report.severity_counts().total(), 7);
    assert!((report.total_cost_usd() - 0.03).abs() < 1e-12);
    assert_eq!(report.total_duration_ms(), 150);

    let recs = report.recommendations();
    assert_eq!(recs.len(), 5);
    assert!(recs[0].starts_with("[CRITICAL] code: issue c1"));
    assert!(recs[1].starts_with("[CRITICAL] documentation: issue c2"));
    assert!(recs[2].starts_with("[HIGH] code: issue h1"));
    assert!(recs[4].starts_with("[HIGH] code: issue h3"));
    assert_eq!(report.failed_validators(), vec!["code"]);
}

#[test]
fn deserialized_report_recomputes_derived_fields() {
    let report = ValidationReport::from_results([
        result("code", ValidationStatus::Fail, 20.0),
        result("tests", ValidationStatus::Pass, 100.0),
    ]);
    let mut json = serde_json::to_value(&report).unwrap();
    json["overall_status"] = serde_json::json!("PASS");
    json["average_score"] = serde_json::json!(99.0);

    let back: ValidationReport = serde_json::from_value(json).unwrap();
    assert_eq!(back.overall_status(), ValidationStatus::Fail);
    assert_eq!(back.average_score(), 60.0);
    assert_eq!(back.created_at(), report.created_at());
}
