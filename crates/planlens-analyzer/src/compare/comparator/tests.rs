//! Tests for the plan comparator

use super::*;
use crate::explain::{BottleneckInfo, Severity};
use crate::test_fixtures::{after_plan, before_plan, key_lookup_plan, node, plan, scan};
use pretty_assertions::assert_eq;

fn high(title: &str) -> BottleneckInfo {
    BottleneckInfo::new(title, "", Severity::High, "fix it")
}

#[test]
fn test_compare_plan_with_itself() {
    let plan = before_plan();
    let comparison = PlanComparator::new().compare(&plan, &plan);

    assert_eq!(comparison.cost_reduction_percentage, 0.0);
    assert_eq!(comparison.row_reduction_percentage, 0.0);
    assert_eq!(comparison.operator_count_delta, 0);
    assert_eq!(comparison.bottleneck_count_delta, 0);
    assert!(comparison.improvements.is_empty());
    assert!(comparison.regressions.is_empty());
    assert_eq!(comparison.verdict, Verdict::NoChange);
    assert_eq!(comparison.verdict.as_str(), "no change");
}

#[test]
fn test_half_cost_is_fifty_percent_reduction() {
    let before = before_plan();
    let mut after = before_plan();
    after.metrics.total_cost = before.metrics.total_cost / 2.0;

    let comparison = PlanComparator::new().compare(&before, &after);
    assert!((comparison.cost_reduction_percentage - 50.0).abs() <= 1.0);
    assert_eq!(comparison.verdict, Verdict::SignificantImprovement);
}

#[test]
fn test_before_and_after_indexing() {
    let before = before_plan();
    let after = after_plan();
    let comparison = PlanComparator::new().compare(&before, &after);

    assert!((comparison.cost_reduction_percentage - 99.7).abs() < 0.05);
    assert_eq!(comparison.verdict, Verdict::SignificantImprovement);
    assert_eq!(comparison.verdict.to_string(), "significant improvement");
    assert_eq!(comparison.before_cost, 8.5);
    assert_eq!(comparison.after_cost, 0.025);
    assert_eq!(comparison.operator_count_delta, 0);
    assert!(comparison.row_reduction_percentage > 99.0);
    assert_eq!(
        comparison.improvements,
        vec![
            "Scans reduced from 2 to 0",
            "Seeks increased from 0 to 2",
            "Estimated cost cut by 99.7%",
        ]
    );
    assert!(!comparison.has_regressions());
}

#[test]
fn test_reverse_comparison_regresses() {
    let comparison = PlanComparator::new().compare(&after_plan(), &before_plan());

    assert!(comparison.cost_reduction_percentage < -10.0);
    assert_eq!(comparison.verdict, Verdict::Regressed);
    assert!(comparison.regressions.contains(&"Scans increased from 0 to 2".to_string()));
    assert!(!comparison.verdict.is_improvement());
}

#[test]
fn test_zero_cost_before_plan() {
    let before = plan(node(OperatorKind::ComputeScalar, 0.0, 0.0));
    let after = after_plan();
    let comparison = PlanComparator::new().compare(&before, &after);

    assert_eq!(comparison.cost_reduction_percentage, 0.0);
    assert_eq!(comparison.row_reduction_percentage, 0.0);
    assert_eq!(comparison.operator_count_delta, 2);
}

#[test]
fn test_moderate_reduction_is_improved() {
    let before = before_plan();
    let mut after = before_plan();
    after.metrics.total_cost = 7.0;

    let comparison = PlanComparator::new().compare(&before, &after);
    assert_eq!(comparison.verdict, Verdict::Improved);
    assert_eq!(comparison.improvements, vec!["Estimated cost reduced by 17.6%"]);
}

#[test]
fn test_structural_improvement_without_cost_change() {
    let before = key_lookup_plan();
    let root = node(OperatorKind::NestedLoops, 20.0, 500.0)
        .with_child(scan(OperatorKind::IndexSeek, "Orders", 80.0, 500.0));
    let mut after = plan(root);
    after.metrics.total_cost = before.metrics.total_cost;

    let comparison = PlanComparator::new().compare(&before, &after);
    assert_eq!(comparison.improvements, vec!["Key lookups reduced from 1 to 0"]);
    assert_eq!(comparison.operator_count_delta, -1);
    assert_eq!(comparison.verdict, Verdict::SlightlyImproved);
}

#[test]
fn test_elapsed_time_speedup() {
    let mut before = before_plan();
    let mut after = before_plan();
    before.metrics.elapsed_time_ms = 400.0;
    after.metrics.elapsed_time_ms = 100.0;

    let comparison = PlanComparator::new().compare(&before, &after);
    assert_eq!(
        comparison.improvements,
        vec!["Elapsed time 4.0x faster (400.0 ms -> 100.0 ms)"]
    );

    after.metrics.elapsed_time_ms = 0.0;
    let comparison = PlanComparator::new().compare(&before, &after);
    assert!(comparison.improvements.is_empty());
}

#[test]
fn test_bottlenecks_matched_by_title() {
    let mut before = before_plan();
    let mut after = before_plan();
    before.bottlenecks = vec![
        high("Large table scan on Orders"),
        high("Expensive hash join"),
        BottleneckInfo::new("Key lookup on Orders", "", Severity::Low, "fix it"),
    ];
    after.bottlenecks = vec![high("Expensive hash join"), high("Expensive sort")];

    let comparison = PlanComparator::new().compare(&before, &after);
    assert_eq!(comparison.bottleneck_count_delta, -1);
    assert_eq!(comparison.improvements, vec!["Resolved: Large table scan on Orders"]);
    assert_eq!(comparison.regressions, vec!["New bottleneck: Expensive sort"]);
    assert_eq!(comparison.verdict, Verdict::NoChange);
}

#[test]
fn test_regression_blocks_significant_verdict() {
    let before = before_plan();
    let mut after = after_plan();
    after.bottlenecks = vec![high("Expensive sort")];

    let comparison = PlanComparator::new().compare(&before, &after);
    assert_eq!(comparison.verdict, Verdict::Improved);
}

#[test]
fn test_summary() {
    let comparison = PlanComparator::new().compare(&before_plan(), &after_plan());
    assert_eq!(
        comparison.summary(),
        "Significant improvement: cost 8.5000 -> 0.0250 (99.7% lower), 3 improvement(s), 0 regression(s)"
    );
}

#[test]
fn test_serialization() {
    let comparison = PlanComparator::new().compare(&before_plan(), &after_plan());
    let json = serde_json::to_string(&comparison).expect("serializable");
    assert!(json.contains("\"verdict\":\"significant_improvement\""));
    let parsed: PlanComparison = serde_json::from_str(&json).expect("deserializable");
    assert_eq!(parsed, comparison);
}
