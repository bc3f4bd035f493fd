//! Tests for the combined plan analyzer

use super::*;
use crate::explain::Severity;
use crate::test_fixtures::{after_plan, before_plan, key_lookup_plan, scan_dominated_plan};
use pretty_assertions::assert_eq;

#[test]
fn test_analyze_scan_dominated_plan() {
    let mut plan = scan_dominated_plan();
    PlanAnalyzer::new()
        .analyze(&mut plan, &CancellationToken::new())
        .expect("analysis failed");

    assert!(
        plan.bottlenecks
            .iter()
            .any(|b| b.severity >= Severity::High && b.title.contains("Orders"))
    );
    assert!(plan.index_suggestions.iter().any(|s| s.table == "Orders"));

    let scan = plan.find_node(1).expect("scan node");
    assert!(scan.has_warning);
}

#[test]
fn test_analyze_without_marking_warnings() {
    let mut plan = scan_dominated_plan();
    let analyzer = PlanAnalyzer::with_settings(AnalyzerSettings::new().with_mark_warnings(false));
    analyzer
        .analyze(&mut plan, &CancellationToken::new())
        .expect("analysis failed");

    assert!(!plan.bottlenecks.is_empty());
    assert!(plan.iter_nodes().all(|n| !n.has_warning));
}

#[test]
fn test_analyze_replaces_earlier_results() {
    let mut plan = key_lookup_plan();
    let analyzer = PlanAnalyzer::new();
    let cancel = CancellationToken::new();

    analyzer.analyze(&mut plan, &cancel).expect("first run");
    let first = (plan.bottlenecks.clone(), plan.index_suggestions.clone());
    analyzer.analyze(&mut plan, &cancel).expect("second run");

    assert_eq!((plan.bottlenecks.clone(), plan.index_suggestions.clone()), first);
}

#[test]
fn test_reanalysis_does_not_repeat_node_warnings() {
    let mut plan = scan_dominated_plan();
    plan.root.children[0].cost.actual_rows = 600_000.0;
    let analyzer = PlanAnalyzer::new();
    let cancel = CancellationToken::new();

    analyzer.analyze(&mut plan, &cancel).expect("first run");
    let first = plan.find_node(1).expect("scan node").warning_message.clone();
    assert_eq!(
        first.as_deref(),
        Some("Large table scan on Orders; Row estimate skew on table scan")
    );

    analyzer.analyze(&mut plan, &cancel).expect("second run");
    let second = plan.find_node(1).expect("scan node").warning_message.clone();
    assert_eq!(second, first);
}

#[test]
fn test_settings_flow_into_the_advisor() {
    let mut plan = scan_dominated_plan();
    let analyzer =
        PlanAnalyzer::with_settings(AnalyzerSettings::new().with_max_included_columns(1));
    analyzer
        .analyze(&mut plan, &CancellationToken::new())
        .expect("analysis failed");

    assert_eq!(plan.index_suggestions[0].included_columns, vec!["OrderId"]);
}

#[test]
fn test_cancelled_analysis_leaves_plan_untouched() {
    let mut plan = scan_dominated_plan();
    let original = plan.clone();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = PlanAnalyzer::new().analyze(&mut plan, &cancel).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(plan, original);
}

#[test]
fn test_analyze_many() {
    let mut plans = vec![scan_dominated_plan(), before_plan(), after_plan()];
    PlanAnalyzer::new()
        .analyze_many(&mut plans, &CancellationToken::new())
        .expect("analysis failed");

    assert!(!plans[0].bottlenecks.is_empty());
    assert_eq!(plans[1].bottlenecks.len(), 2);

    let mut single = scan_dominated_plan();
    PlanAnalyzer::new()
        .analyze(&mut single, &CancellationToken::new())
        .expect("analysis failed");
    assert_eq!(plans[0].bottlenecks, single.bottlenecks);
}

#[test]
fn test_analyze_many_cancelled() {
    let mut plans = vec![before_plan(), after_plan()];
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = PlanAnalyzer::new()
        .analyze_many(&mut plans, &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(plans.iter().all(|p| p.bottlenecks.is_empty()));
}

#[test]
fn test_expensive_operations_use_configured_threshold() {
    let plan = before_plan();
    assert_eq!(PlanAnalyzer::new().expensive_operations(&plan).len(), 3);

    let strict =
        PlanAnalyzer::with_settings(AnalyzerSettings::new().with_expensive_threshold(40.0));
    assert_eq!(strict.expensive_operations(&plan).len(), 1);
    assert_eq!(strict.cost_summary(&plan).expensive_node_ids, vec![1]);
}
