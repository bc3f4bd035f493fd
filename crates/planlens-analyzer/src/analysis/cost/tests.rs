//! Tests for the cost analyzer

use super::*;
use crate::explain::{OperationCost, OperatorKind};
use crate::test_fixtures::{before_plan, node, plan, scan, scan_dominated_plan};
use pretty_assertions::assert_eq;

#[test]
fn test_expensive_operations_sorted_by_cost() {
    let plan = before_plan();
    let analyzer = CostAnalyzer::new(&plan);

    let ids: Vec<_> = analyzer
        .expensive_operations(DEFAULT_EXPENSIVE_THRESHOLD)
        .iter()
        .map(|n| (n.id, n.cost.cost_percentage))
        .collect();
    assert_eq!(ids, vec![(1, 50.0), (2, 30.0), (0, 20.0)]);
}

#[test]
fn test_expensive_operations_threshold_is_inclusive() {
    let plan = before_plan();
    let analyzer = CostAnalyzer::new(&plan);
    assert_eq!(analyzer.expensive_operations(30.0).len(), 2);
    assert!(analyzer.expensive_operations(50.1).is_empty());
}

#[test]
fn test_expensive_operations_ties_keep_traversal_order() {
    let root = node(OperatorKind::NestedLoops, 20.0, 10.0)
        .with_child(scan(OperatorKind::IndexSeek, "A", 40.0, 1.0))
        .with_child(scan(OperatorKind::IndexSeek, "B", 40.0, 1.0));
    let plan = plan(root);

    let tables: Vec<_> = CostAnalyzer::new(&plan)
        .expensive_operations(40.0)
        .iter()
        .filter_map(|n| n.table_name())
        .collect();
    assert_eq!(tables, vec!["A", "B"]);
}

#[test]
fn test_most_expensive() {
    let plan = scan_dominated_plan();
    let top = CostAnalyzer::new(&plan).most_expensive().expect("node");
    assert_eq!(top.kind, OperatorKind::TableScan);
    assert_eq!(top.cost.cost_percentage, 96.0);
}

#[test]
fn test_most_expensive_tie_prefers_first() {
    let root = node(OperatorKind::NestedLoops, 50.0, 10.0)
        .with_child(scan(OperatorKind::IndexSeek, "A", 50.0, 1.0));
    let plan = plan(root);
    assert_eq!(CostAnalyzer::new(&plan).most_expensive().map(|n| n.id), Some(0));
}

#[test]
fn test_cpu_and_io_bound() {
    let cpu_heavy = node(OperatorKind::Sort, 40.0, 100.0)
        .with_cost(OperationCost::new(0.0, 0.0).with_cpu_io(3.0, 1.0));
    let io_heavy = scan(OperatorKind::TableScan, "T", 60.0, 100.0)
        .with_cost(OperationCost::new(0.0, 0.0).with_cpu_io(0.1, 5.0));
    let balanced = node(OperatorKind::Filter, 0.0, 1.0)
        .with_cost(OperationCost::new(0.0, 0.0).with_cpu_io(1.0, 1.0));
    let plan = plan(cpu_heavy.with_child(io_heavy).with_child(balanced));
    let analyzer = CostAnalyzer::new(&plan);

    let cpu: Vec<_> = analyzer.cpu_bound_operations().iter().map(|n| n.kind).collect();
    let io: Vec<_> = analyzer.io_bound_operations().iter().map(|n| n.kind).collect();
    assert_eq!(cpu, vec![OperatorKind::Sort]);
    assert_eq!(io, vec![OperatorKind::TableScan]);
}

#[test]
fn test_zero_costs_are_neither_cpu_nor_io_bound() {
    let plan = plan(node(OperatorKind::ComputeScalar, 0.0, 0.0));
    let analyzer = CostAnalyzer::new(&plan);
    assert!(analyzer.cpu_bound_operations().is_empty());
    assert!(analyzer.io_bound_operations().is_empty());
    assert!(analyzer.expensive_operations(DEFAULT_EXPENSIVE_THRESHOLD).is_empty());
}

#[test]
fn test_scan_cost_percentage() {
    let plan = before_plan();
    assert_eq!(CostAnalyzer::new(&plan).scan_cost_percentage(), 80.0);
}

#[test]
fn test_summary() {
    let plan = before_plan();
    let summary = CostAnalyzer::new(&plan).summary(DEFAULT_EXPENSIVE_THRESHOLD);

    assert_eq!(summary.total_cost, 8.5);
    assert_eq!(summary.max_cost_percentage, 50.0);
    assert_eq!(summary.most_expensive_node, Some(1));
    assert_eq!(summary.expensive_node_ids, vec![1, 2, 0]);
    assert_eq!(summary.scan_cost_percentage, 80.0);
}
