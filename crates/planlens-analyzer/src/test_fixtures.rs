//! Canonical plans shared by the unit tests

use crate::explain::{
    ExecutionPlan, IndexReference, OperationCost, OperatorKind, PlanNode, TableReference,
};
use planlens_core::PlanEngine;

/// A node with a fixed cost percentage and row estimate
pub fn node(kind: OperatorKind, pct: f64, rows: f64) -> PlanNode {
    PlanNode::new(kind, kind.display_name()).with_cost(
        OperationCost::new(pct, pct)
            .with_estimated_rows(rows)
            .with_cost_percentage(pct),
    )
}

/// A scan node reading `table`
pub fn scan(kind: OperatorKind, table: &str, pct: f64, rows: f64) -> PlanNode {
    node(kind, pct, rows).with_table(TableReference::new(table))
}

/// Builds a plan from a root, renumbering ids in pre-order
pub fn plan(mut root: PlanNode) -> ExecutionPlan {
    let mut next = 0;
    root.assign_depths(0);
    root.visit_mut(&mut |n| {
        n.id = next;
        next += 1;
    });
    let mut plan = ExecutionPlan::new(PlanEngine::SqlServer, root);
    plan.metrics.refresh_operator_counts(&plan.root);
    plan
}

/// A plan dominated by one 50,000-row table scan on `Orders` (96% of cost)
pub fn scan_dominated_plan() -> ExecutionPlan {
    let table_scan = scan(OperatorKind::TableScan, "Orders", 96.0, 50_000.0)
        .with_predicate("[dbo].[Orders].[CustomerId]=(42)")
        .with_output_columns(["OrderId", "CustomerId", "OrderDate", "Total"]);
    let root = node(OperatorKind::ComputeScalar, 4.0, 50_000.0).with_child(table_scan);
    plan(root)
}

/// Two table scans joined by a hash join, total cost 8.5
pub fn before_plan() -> ExecutionPlan {
    let root = node(OperatorKind::HashJoin, 20.0, 5_000.0)
        .with_child(scan(OperatorKind::TableScan, "Orders", 50.0, 40_000.0))
        .with_child(scan(OperatorKind::TableScan, "Customers", 30.0, 10_000.0));
    let mut plan = plan(root);
    plan.metrics.total_cost = 8.5;
    plan
}

/// The same query after indexing: two seeks under nested loops, total cost 0.025
pub fn after_plan() -> ExecutionPlan {
    let root = node(OperatorKind::NestedLoops, 10.0, 50.0)
        .with_child(scan(OperatorKind::IndexSeek, "Orders", 50.0, 50.0))
        .with_child(scan(
            OperatorKind::ClusteredIndexSeek,
            "Customers",
            40.0,
            1.0,
        ));
    let mut plan = plan(root);
    plan.metrics.total_cost = 0.025;
    plan
}

/// A seek + key lookup pair on `Orders` under a nested loops join
pub fn key_lookup_plan() -> ExecutionPlan {
    let seek = scan(OperatorKind::IndexSeek, "Orders", 20.0, 500.0)
        .with_index(
            IndexReference::new("IX_Orders_CustomerId", "Orders")
                .with_key_columns(["CustomerId"]),
        )
        .with_output_columns(["OrderId", "CustomerId"]);
    let lookup = scan(OperatorKind::KeyLookup, "Orders", 60.0, 500.0)
        .with_output_columns(["OrderDate", "Total", "CustomerId"]);
    let root = node(OperatorKind::NestedLoops, 20.0, 500.0)
        .with_child(seek)
        .with_child(lookup);
    let mut plan = plan(root);
    plan.metrics.total_cost = 1.0;
    plan
}
