//! Bottleneck Detector
//!
//! Runs a fixed list of independent rules over every node of a plan. Each
//! rule looks at one node and reports at most one finding for it; the
//! combined findings are ranked by severity, then by impact.

use crate::explain::{BottleneckInfo, ExecutionPlan, OperatorKind, PlanNode, Severity};

/// A rule inspects one node and optionally reports a finding
pub type BottleneckRule = fn(&PlanNode) -> Option<BottleneckInfo>;

/// Scans reading fewer rows are not reported
pub const LARGE_SCAN_MIN_ROWS: f64 = 1_000.0;
/// Sorts over fewer rows are not reported
pub const EXPENSIVE_SORT_MIN_ROWS: f64 = 10_000.0;
/// Hash joins below this share of plan cost are not reported
pub const HASH_JOIN_MIN_PERCENTAGE: f64 = 30.0;
/// Any other operator at or above this share of plan cost is reported
pub const DOMINANT_MIN_PERCENTAGE: f64 = 50.0;

const RULES: &[BottleneckRule] = &[
    large_scan,
    key_lookup,
    row_estimate_skew,
    expensive_sort,
    expensive_hash_join,
    dominant_operation,
];

/// Detects performance bottlenecks in a plan
#[derive(Debug, Clone, Copy, Default)]
pub struct BottleneckDetector;

impl BottleneckDetector {
    pub fn new() -> Self {
        Self
    }

    /// Runs every rule over every node and returns the ranked findings.
    ///
    /// The plan is not modified; see [`mark_warnings`] to flag the nodes.
    pub fn detect(&self, plan: &ExecutionPlan) -> Vec<BottleneckInfo> {
        let mut findings: Vec<BottleneckInfo> = plan
            .iter_nodes()
            .flat_map(|node| RULES.iter().filter_map(move |rule| rule(node)))
            .collect();

        rank(&mut findings);

        tracing::debug!(plan_id = %plan.id, count = findings.len(), "detected bottlenecks");
        findings
    }
}

/// Sorts findings by severity, then impact, both descending. Equal findings
/// keep their detection order.
pub fn rank(findings: &mut [BottleneckInfo]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.impact_percentage.total_cmp(&a.impact_percentage))
    });
}

/// Flags every node referenced by a finding, using the finding's title as
/// the warning message
pub fn mark_warnings(plan: &mut ExecutionPlan, findings: &[BottleneckInfo]) {
    plan.root.visit_mut(&mut |node| {
        let id = node.id;
        for finding in findings.iter().filter(|f| f.node_id == Some(id)) {
            node.add_warning(finding.title.clone());
        }
    });
}

fn node_name(node: &PlanNode) -> &str {
    if node.label.is_empty() {
        &node.operator_name
    } else {
        &node.label
    }
}

fn table_label(node: &PlanNode) -> &str {
    node.table_name().unwrap_or("an unnamed source")
}

fn finding(
    node: &PlanNode,
    title: String,
    description: String,
    severity: Severity,
    recommendation: &str,
) -> BottleneckInfo {
    BottleneckInfo::new(title, description, severity, recommendation)
        .with_node(node.id)
        .with_impact(node.cost.cost_percentage)
}

fn large_scan(node: &PlanNode) -> Option<BottleneckInfo> {
    let rows = node.cost.effective_rows();
    if !node.kind.is_full_scan() || rows < LARGE_SCAN_MIN_ROWS {
        return None;
    }

    let severity = if rows >= 100_000.0 {
        Severity::Critical
    } else if rows >= 10_000.0 {
        Severity::High
    } else if rows >= 5_000.0 {
        Severity::Medium
    } else {
        Severity::Low
    };

    let table = table_label(node);
    Some(finding(
        node,
        format!("Large {} on {}", node.kind.display_name(), table),
        format!(
            "{} reads {:.0} rows from {} ({:.1}% of plan cost)",
            node_name(node),
            rows,
            table,
            node.cost.cost_percentage
        ),
        severity,
        "Create an index on the filtered columns so the optimizer can seek instead of scanning the whole table",
    ))
}

fn key_lookup(node: &PlanNode) -> Option<BottleneckInfo> {
    if !node.kind.is_lookup() {
        return None;
    }

    let rows = node.cost.effective_rows();
    let severity = if rows >= 10_000.0 {
        Severity::High
    } else if rows >= 1_000.0 {
        Severity::Medium
    } else {
        Severity::Low
    };

    let table = table_label(node);
    Some(finding(
        node,
        format!("Key lookup on {table}"),
        format!(
            "{} fetches {:.0} rows from {} one row at a time ({:.1}% of plan cost)",
            node_name(node),
            rows,
            table,
            node.cost.cost_percentage
        ),
        severity,
        "Add the looked-up columns to the seek index as INCLUDE columns to make it covering",
    ))
}

fn row_estimate_skew(node: &PlanNode) -> Option<BottleneckInfo> {
    let cost = &node.cost;
    if cost.estimated_rows <= 0.0 || cost.actual_rows <= 0.0 {
        return None;
    }

    let ratio = cost.row_estimate_ratio();
    if (0.1..=10.0).contains(&ratio) {
        return None;
    }

    let severity = if !(0.01..=100.0).contains(&ratio) {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(finding(
        node,
        format!("Row estimate skew on {}", node_name(node)),
        format!(
            "Estimated {:.0} rows but {:.0} were returned ({ratio:.2}x)",
            cost.estimated_rows, cost.actual_rows
        ),
        severity,
        "Update statistics on the tables involved so the optimizer sees accurate cardinalities",
    ))
}

fn expensive_sort(node: &PlanNode) -> Option<BottleneckInfo> {
    let rows = node.cost.effective_rows();
    if !node.kind.is_sort() || rows < EXPENSIVE_SORT_MIN_ROWS {
        return None;
    }

    let severity = if rows >= 1_000_000.0 {
        Severity::Critical
    } else if rows >= 100_000.0 {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(finding(
        node,
        "Expensive sort".to_string(),
        format!(
            "{} orders {:.0} rows ({:.1}% of plan cost)",
            node_name(node),
            rows,
            node.cost.cost_percentage
        ),
        severity,
        "Add an index whose key order matches the ORDER BY or GROUP BY columns, or reduce the rows being sorted",
    ))
}

fn expensive_hash_join(node: &PlanNode) -> Option<BottleneckInfo> {
    if node.kind != OperatorKind::HashJoin || node.cost.cost_percentage < HASH_JOIN_MIN_PERCENTAGE
    {
        return None;
    }

    Some(finding(
        node,
        "Expensive hash join".to_string(),
        format!(
            "{} accounts for {:.1}% of plan cost",
            node_name(node),
            node.cost.cost_percentage
        ),
        Severity::High,
        "Index the join columns so a nested loops or merge join becomes possible",
    ))
}

fn dominant_operation(node: &PlanNode) -> Option<BottleneckInfo> {
    let pct = node.cost.cost_percentage;
    let kind = node.kind;
    let covered =
        kind.is_scan() || kind.is_lookup() || kind.is_sort() || kind == OperatorKind::HashJoin;
    if covered || pct < DOMINANT_MIN_PERCENTAGE {
        return None;
    }

    let severity = if pct >= 70.0 {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(finding(
        node,
        format!("Dominant operation: {}", node_name(node)),
        format!("A single operator accounts for {pct:.1}% of plan cost"),
        severity,
        "Focus tuning on this operator first; reducing its input rows has the largest effect on the plan",
    ))
}
