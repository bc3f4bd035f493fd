//! PostgreSQL EXPLAIN Parser
//!
//! Parses the output of `EXPLAIN (FORMAT JSON)` and
//! `EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON)`.
//!
//! PostgreSQL reports `Total Cost` cumulatively: a node's cost includes the
//! cost of everything below it. The parser derives each node's own cost by
//! subtracting its children's totals before computing cost percentages.
//!
//! # Examples
//!
//! ```
//! use planlens_analyzer::explain::postgres::parse_postgres_explain;
//!
//! let json_output = r#"[
//!   {
//!     "Plan": {
//!       "Node Type": "Seq Scan",
//!       "Relation Name": "users",
//!       "Startup Cost": 0.0,
//!       "Total Cost": 10.0,
//!       "Plan Rows": 100,
//!       "Plan Width": 36
//!     }
//!   }
//! ]"#;
//!
//! let plan = parse_postgres_explain(json_output).unwrap();
//! assert!(plan.has_full_scans());
//! ```

use crate::explain::operator::OperatorKind;
use crate::explain::parser::{PlanParser, cost_percentage};
use crate::explain::plan::{
    ExecutionPlan, IndexReference, OperationCost, PlanNode, QueryMetrics, TableReference,
};
use async_trait::async_trait;
use planlens_core::{CancellationToken, PlanEngine, PlanError, Result, ensure_not_cancelled};
use serde_json::Value;

/// Predicate fields, most specific first
const PREDICATE_FIELDS: &[&str] = &[
    "Filter",
    "Index Cond",
    "Recheck Cond",
    "Join Filter",
    "Hash Cond",
    "Merge Cond",
];

/// Keys read into dedicated fields; everything else lands in `properties`
const KNOWN_KEYS: &[&str] = &[
    "Node Type",
    "Relation Name",
    "Schema",
    "Alias",
    "Index Name",
    "Total Cost",
    "Plan Rows",
    "Actual Rows",
    "Actual Loops",
    "Filter",
    "Index Cond",
    "Recheck Cond",
    "Join Filter",
    "Hash Cond",
    "Merge Cond",
    "Rows Removed by Filter",
    "Output",
    "Plans",
];

/// Parser for PostgreSQL JSON EXPLAIN output
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresJsonParser;

impl PostgresJsonParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlanParser for PostgresJsonParser {
    fn engine(&self) -> PlanEngine {
        PlanEngine::PostgreSql
    }

    fn can_parse(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
            return false;
        }
        serde_json::from_str::<Value>(trimmed)
            .ok()
            .as_ref()
            .and_then(statement_object)
            .and_then(plan_object)
            .is_some()
    }

    #[tracing::instrument(skip_all, fields(len = raw.len()))]
    async fn parse(&self, raw: &str, cancel: &CancellationToken) -> Result<ExecutionPlan> {
        ensure_not_cancelled(cancel)?;
        parse_postgres_explain(raw)
    }
}

/// Parses PostgreSQL EXPLAIN (FORMAT JSON) output
pub fn parse_postgres_explain(json: &str) -> Result<ExecutionPlan> {
    let value: Value = serde_json::from_str(json.trim())?;

    // PostgreSQL JSON EXPLAIN wraps the statement in an array
    let statement =
        statement_object(&value).ok_or_else(|| PlanError::parse("empty EXPLAIN output"))?;
    let plan_obj = plan_object(statement)
        .ok_or_else(|| PlanError::parse("missing Plan object in EXPLAIN output"))?;

    let total_cost = f64_field(plan_obj, "Total Cost").unwrap_or(0.0);
    let mut builder = NodeBuilder {
        next_id: 0,
        total_cost,
        max_workers: 0,
    };
    let root = builder.build(plan_obj, 0)?;

    let mut metrics = QueryMetrics {
        total_cost,
        planning_time_ms: f64_field(statement, "Planning Time").unwrap_or(0.0),
        elapsed_time_ms: f64_field(statement, "Execution Time").unwrap_or(0.0),
        rows_affected: root.cost.actual_rows.max(0.0) as u64,
        degree_of_parallelism: builder.max_workers + 1,
        ..QueryMetrics::default()
    };
    let hit = u64_field(plan_obj, "Shared Hit Blocks").unwrap_or(0);
    let read = u64_field(plan_obj, "Shared Read Blocks").unwrap_or(0);
    metrics.logical_reads = hit + read;
    metrics.physical_reads = read;
    metrics.refresh_operator_counts(&root);

    tracing::debug!(
        nodes = metrics.operator_count,
        total_cost,
        "parsed PostgreSQL JSON plan"
    );

    let query_text = statement
        .get("Query Text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(ExecutionPlan::new(PlanEngine::PostgreSql, root)
        .with_metrics(metrics)
        .with_query_text(query_text)
        .with_raw_plan(json))
}

/// The statement object: the first array element, or the value itself
fn statement_object(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

fn plan_object(statement: &Value) -> Option<&Value> {
    statement
        .get("Plan")
        .or_else(|| statement.get("plan"))
        .filter(|p| p.is_object())
}

struct NodeBuilder {
    next_id: usize,
    total_cost: f64,
    max_workers: u32,
}

impl NodeBuilder {
    /// Parses a single plan node and its children
    fn build(&mut self, value: &Value, depth: usize) -> Result<PlanNode> {
        let node_type = value
            .get("Node Type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PlanError::parse("plan node is missing Node Type"))?;

        let id = self.next_id;
        self.next_id += 1;

        let mut node = PlanNode::new(refine_kind(node_type, value), node_type);
        node.id = id;
        node.depth = depth;

        if let Some(rel) = str_field(value, "Relation Name") {
            let mut table = TableReference::new(rel).with_schema(
                str_field(value, "Schema").unwrap_or(PlanEngine::PostgreSql.default_schema()),
            );
            table.alias = str_field(value, "Alias")
                .filter(|alias| *alias != rel)
                .map(String::from);
            node.table = Some(table);
        }

        if let Some(idx) = str_field(value, "Index Name") {
            node.index = Some(IndexReference::new(
                idx,
                str_field(value, "Relation Name").unwrap_or_default(),
            ));
        }

        node.predicate = PREDICATE_FIELDS
            .iter()
            .find_map(|field| str_field(value, field))
            .unwrap_or_default()
            .to_string();

        if let Some(output) = value.get("Output").and_then(|v| v.as_array()) {
            node.output_columns = output
                .iter()
                .filter_map(|k| k.as_str().map(String::from))
                .collect();
        }

        if let Some(workers) = value
            .get("Workers Launched")
            .or_else(|| value.get("Workers Planned"))
            .and_then(|v| v.as_u64())
        {
            self.max_workers = self.max_workers.max(workers as u32);
        }

        // Parse child plans
        if let Some(plans) = value.get("Plans").and_then(|v| v.as_array()) {
            for child_value in plans {
                let child = self.build(child_value, depth + 1)?;
                node.children.push(child);
            }
        }

        node.cost = self.read_cost(value, &node.children);

        for warning in detect_warnings(value, &node.cost) {
            node.add_warning(warning);
        }

        if let Some(obj) = value.as_object() {
            for (key, val) in obj {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    let text = match val {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    node.properties.insert(key.clone(), text);
                }
            }
        }

        Ok(node)
    }

    fn read_cost(&self, value: &Value, children: &[PlanNode]) -> OperationCost {
        let subtree = f64_field(value, "Total Cost").unwrap_or(0.0);
        let children_total: f64 = children.iter().map(|c| c.cost.subtree_cost).sum();
        let own = (subtree - children_total).max(0.0);

        let mut cost = OperationCost::new(own, subtree)
            .with_estimated_rows(f64_field(value, "Plan Rows").unwrap_or(0.0))
            .with_actual_rows(f64_field(value, "Actual Rows").unwrap_or(0.0));
        cost.execution_count = u64_field(value, "Actual Loops").unwrap_or(1).max(1);
        cost.cost_percentage = cost_percentage(own, self.total_cost);
        cost
    }
}

/// Splits generic node types using the fields that qualify them
fn refine_kind(node_type: &str, value: &Value) -> OperatorKind {
    match node_type {
        "Aggregate" => match str_field(value, "Strategy") {
            Some("Hashed") | Some("Mixed") => OperatorKind::HashAggregate,
            Some("Sorted") => OperatorKind::StreamAggregate,
            _ => OperatorKind::Aggregate,
        },
        "ModifyTable" => match str_field(value, "Operation") {
            Some("Insert") => OperatorKind::Insert,
            Some("Update") => OperatorKind::Update,
            Some("Delete") => OperatorKind::Delete,
            _ => OperatorKind::Other,
        },
        _ => OperatorKind::from_postgres(node_type),
    }
}

fn detect_warnings(value: &Value, cost: &OperationCost) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(removed) = f64_field(value, "Rows Removed by Filter")
        && removed > cost.actual_rows * 10.0
    {
        warnings.push(format!(
            "Filter removed {removed:.0} rows to return {:.0}",
            cost.actual_rows
        ));
    }

    if str_field(value, "Sort Space Type") == Some("Disk") {
        warnings.push("Sort spilled to disk".to_string());
    }

    if let Some(batches) = u64_field(value, "Hash Batches")
        && batches > 1
    {
        warnings.push(format!("Hash spilled to disk in {batches} batches"));
    }

    warnings
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

fn f64_field(value: &Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
}

fn u64_field(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests;
