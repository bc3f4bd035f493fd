//! Canonical Plan Model - Data structures for representing execution plans
//!
//! This module defines the engine-agnostic plan tree that both the SQL Server
//! showplan parser and the PostgreSQL JSON parser produce. Every analysis
//! pass works on these types only.

use crate::explain::findings::{BottleneckInfo, IndexSuggestion};
use crate::explain::operator::OperatorKind;
use chrono::{DateTime, Utc};
use planlens_core::PlanEngine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a complete, canonical execution plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    /// Short opaque identifier
    pub id: String,
    /// Query text the plan was produced for
    pub query_text: String,
    /// Engine that produced the plan
    pub engine: PlanEngine,
    /// Root node of the plan tree
    pub root: PlanNode,
    /// Plan-wide metrics
    pub metrics: QueryMetrics,
    /// Bottlenecks found by the bottleneck detector
    pub bottlenecks: Vec<BottleneckInfo>,
    /// Index proposals from the index advisor
    pub index_suggestions: Vec<IndexSuggestion>,
    /// When this plan object was created
    pub created_at: DateTime<Utc>,
    /// Raw plan text, kept for audit and never reparsed
    pub raw_plan: String,
}

impl ExecutionPlan {
    /// Creates a new plan with the given engine and root node
    pub fn new(engine: PlanEngine, root: PlanNode) -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        let metrics = QueryMetrics {
            total_cost: root.cost.subtree_cost,
            ..QueryMetrics::default()
        };
        Self {
            id,
            query_text: String::new(),
            engine,
            root,
            metrics,
            bottlenecks: Vec::new(),
            index_suggestions: Vec::new(),
            created_at: Utc::now(),
            raw_plan: String::new(),
        }
    }

    /// Sets the query text
    pub fn with_query_text(mut self, query: impl Into<String>) -> Self {
        self.query_text = query.into();
        self
    }

    /// Sets the raw plan text
    pub fn with_raw_plan(mut self, raw: impl Into<String>) -> Self {
        self.raw_plan = raw.into();
        self
    }

    /// Sets the metrics
    pub fn with_metrics(mut self, metrics: QueryMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Display name of the engine
    pub fn engine_name(&self) -> &'static str {
        self.engine.as_str()
    }

    /// Returns an iterator over all nodes in the plan, root first (pre-order).
    ///
    /// Every call walks the tree again.
    pub fn iter_nodes(&self) -> PlanNodeIterator<'_> {
        self.root.iter()
    }

    /// Total number of nodes, including the root
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Highest cost percentage found on any node
    pub fn max_cost_percentage(&self) -> f64 {
        self.iter_nodes()
            .map(|n| n.cost.cost_percentage)
            .fold(0.0, f64::max)
    }

    /// Total plan cost: the reported statement cost, falling back to the
    /// root's subtree cost
    pub fn total_cost(&self) -> f64 {
        if self.metrics.total_cost > 0.0 {
            self.metrics.total_cost
        } else {
            self.root.cost.subtree_cost.max(self.root.cost.total_cost)
        }
    }

    /// Finds a node by id
    pub fn find_node(&self, id: usize) -> Option<&PlanNode> {
        self.iter_nodes().find(|n| n.id == id)
    }

    /// Finds all nodes of a specific operator kind
    pub fn nodes_of_kind(&self, kind: OperatorKind) -> Vec<&PlanNode> {
        self.iter_nodes().filter(|n| n.kind == kind).collect()
    }

    /// Returns true if the plan contains any full table scans
    pub fn has_full_scans(&self) -> bool {
        self.iter_nodes().any(|n| n.kind.is_full_scan())
    }
}

/// Plan-wide metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryMetrics {
    /// Elapsed time in milliseconds (0 when not reported)
    pub elapsed_time_ms: f64,
    /// CPU time in milliseconds (0 when not reported)
    pub cpu_time_ms: f64,
    /// Planning time in milliseconds (0 when not reported)
    pub planning_time_ms: f64,
    pub logical_reads: u64,
    pub physical_reads: u64,
    pub rows_affected: u64,
    /// Total estimated cost of the statement
    pub total_cost: f64,
    /// Number of operators in the plan
    pub operator_count: usize,
    pub scan_count: usize,
    pub seek_count: usize,
    pub lookup_count: usize,
    pub join_count: usize,
    pub sort_count: usize,
    /// Degree of parallelism (1 for serial plans, 0 when unknown)
    pub degree_of_parallelism: u32,
}

impl QueryMetrics {
    /// Recounts operators from the given tree
    pub fn refresh_operator_counts(&mut self, root: &PlanNode) {
        self.operator_count = 0;
        self.scan_count = 0;
        self.seek_count = 0;
        self.lookup_count = 0;
        self.join_count = 0;
        self.sort_count = 0;

        for node in root.iter() {
            self.operator_count += 1;
            let kind = node.kind;
            if kind.is_scan() {
                self.scan_count += 1;
            } else if kind.is_seek() {
                self.seek_count += 1;
            } else if kind.is_lookup() {
                self.lookup_count += 1;
            } else if kind.is_join() {
                self.join_count += 1;
            } else if kind.is_sort() {
                self.sort_count += 1;
            }
        }
    }
}

/// Represents a single operator in the plan tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanNode {
    /// Identifier, unique within a plan
    pub id: usize,
    /// Display label
    pub label: String,
    /// Operator name exactly as the source reported it
    pub operator_name: String,
    /// Logical operator name, when the source reports one
    pub logical_operator: String,
    /// Shared operator kind
    pub kind: OperatorKind,
    /// Cost information
    pub cost: OperationCost,
    /// Table the operator reads or writes
    pub table: Option<TableReference>,
    /// Index the operator uses
    pub index: Option<IndexReference>,
    /// Most specific predicate available (empty when none)
    pub predicate: String,
    /// Output columns
    pub output_columns: Vec<String>,
    /// Distance from the root
    pub depth: usize,
    pub has_warning: bool,
    pub warning_message: Option<String>,
    /// Additional properties not captured by specific fields
    pub properties: BTreeMap<String, String>,
    /// Child nodes
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Creates a new node of the given kind
    pub fn new(kind: OperatorKind, operator_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            label: String::new(),
            operator_name: operator_name.into(),
            logical_operator: String::new(),
            kind,
            cost: OperationCost::default(),
            table: None,
            index: None,
            predicate: String::new(),
            output_columns: Vec::new(),
            depth: 0,
            has_warning: false,
            warning_message: None,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Sets the id
    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    /// Sets the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the table reference
    pub fn with_table(mut self, table: TableReference) -> Self {
        self.table = Some(table);
        self
    }

    /// Sets the index reference
    pub fn with_index(mut self, index: IndexReference) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the cost information
    pub fn with_cost(mut self, cost: OperationCost) -> Self {
        self.cost = cost;
        self
    }

    /// Sets the predicate
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = predicate.into();
        self
    }

    /// Sets the output columns
    pub fn with_output_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a child node, fixing up the depth of the child's subtree
    pub fn with_child(mut self, mut child: PlanNode) -> Self {
        child.assign_depths(self.depth + 1);
        self.children.push(child);
        self
    }

    /// Sets this node's depth and re-derives every descendant's depth
    pub fn assign_depths(&mut self, depth: usize) {
        self.depth = depth;
        for child in &mut self.children {
            child.assign_depths(depth + 1);
        }
    }

    /// Flags the node, appending to any existing warning message. A message
    /// already present as a `"; "`-separated segment is not repeated.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.has_warning = true;
        self.warning_message = Some(match self.warning_message.take() {
            Some(existing) if existing.split("; ").any(|segment| segment == message) => existing,
            Some(existing) if !existing.is_empty() => format!("{existing}; {message}"),
            _ => message,
        });
    }

    /// Output columns joined with `", "`
    pub fn output_columns_display(&self) -> String {
        self.output_columns.join(", ")
    }

    /// Name of the referenced table, if any
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_ref().map(|t| t.name.as_str())
    }

    /// Iterates over this node and all of its descendants (pre-order)
    pub fn iter(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(self)
    }

    /// Visits this node and all descendants in pre-order, mutably
    pub fn visit_mut<F: FnMut(&mut PlanNode)>(&mut self, f: &mut F) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// Returns the total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Returns the number of levels in this subtree
    pub fn max_depth(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            1 + self.children.iter().map(|c| c.max_depth()).max().unwrap_or(0)
        }
    }

    /// Returns true if this is a leaf node (no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Cost and cardinality for a single operator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OperationCost {
    pub cpu_cost: f64,
    pub io_cost: f64,
    /// Cost of this operator alone
    pub total_cost: f64,
    /// Cost of this operator and all of its descendants
    pub subtree_cost: f64,
    pub estimated_rows: f64,
    /// Actual rows (0 when the plan carries no runtime statistics)
    pub actual_rows: f64,
    /// Number of times the operator ran (at least 1)
    pub execution_count: u64,
    /// Share of the whole plan's cost, 0-100
    pub cost_percentage: f64,
}

impl Default for OperationCost {
    fn default() -> Self {
        Self {
            cpu_cost: 0.0,
            io_cost: 0.0,
            total_cost: 0.0,
            subtree_cost: 0.0,
            estimated_rows: 0.0,
            actual_rows: 0.0,
            execution_count: 1,
            cost_percentage: 0.0,
        }
    }
}

impl OperationCost {
    /// Creates a cost with the given own and subtree cost
    pub fn new(total_cost: f64, subtree_cost: f64) -> Self {
        Self {
            total_cost,
            subtree_cost,
            ..Self::default()
        }
    }

    /// Sets CPU and IO cost, and total cost as their sum
    pub fn with_cpu_io(mut self, cpu: f64, io: f64) -> Self {
        self.cpu_cost = cpu;
        self.io_cost = io;
        self.total_cost = cpu + io;
        self
    }

    pub fn with_estimated_rows(mut self, rows: f64) -> Self {
        self.estimated_rows = rows;
        self
    }

    pub fn with_actual_rows(mut self, rows: f64) -> Self {
        self.actual_rows = rows;
        self
    }

    pub fn with_cost_percentage(mut self, pct: f64) -> Self {
        self.cost_percentage = pct;
        self
    }

    /// `actual / estimated`, or 0 when there is no estimate
    pub fn row_estimate_ratio(&self) -> f64 {
        if self.estimated_rows > 0.0 {
            self.actual_rows / self.estimated_rows
        } else {
            0.0
        }
    }

    /// Actual rows when known, otherwise the estimate
    pub fn effective_rows(&self) -> f64 {
        if self.actual_rows > 0.0 {
            self.actual_rows
        } else {
            self.estimated_rows
        }
    }
}

/// Table read or written by an operator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableReference {
    pub schema: String,
    pub name: String,
    pub alias: Option<String>,
    pub estimated_row_count: Option<u64>,
}

impl TableReference {
    pub const DEFAULT_SCHEMA: &'static str = "dbo";

    /// Creates a reference in the default schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: Self::DEFAULT_SCHEMA.to_string(),
            name: name.into(),
            alias: None,
            estimated_row_count: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// `schema.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Index used by an operator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexReference {
    pub name: String,
    pub table: String,
    pub key_columns: Vec<String>,
    pub included_columns: Vec<String>,
    pub is_clustered: bool,
    pub is_unique: bool,
}

impl IndexReference {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_key_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn clustered(mut self) -> Self {
        self.is_clustered = true;
        self
    }
}

/// Iterator for traversing plan nodes depth-first, parents before children
pub struct PlanNodeIterator<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> PlanNodeIterator<'a> {
    fn new(root: &'a PlanNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for PlanNodeIterator<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push children in reverse order so we visit them in order
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}
