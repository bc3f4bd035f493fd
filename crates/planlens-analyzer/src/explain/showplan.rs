//! SQL Server Showplan XML Parser
//!
//! Parses the XML produced by `SET STATISTICS XML ON` or `SET SHOWPLAN_XML ON`.
//!
//! Showplan XML nests one `RelOp` element per operator. Operator-specific
//! details (the table `Object`, seek and filter predicates, hash keys) live in
//! a child element named after the operator, e.g. `IndexScan` or `Hash`, and
//! child operators are `RelOp` elements nested somewhere inside it.
//!
//! # Examples
//!
//! ```
//! use planlens_analyzer::explain::showplan::parse_showplan;
//!
//! let xml = r#"<ShowPlanXML xmlns="http://schemas.microsoft.com/sqlserver/2004/07/showplan">
//!   <BatchSequence><Batch><Statements>
//!     <StmtSimple StatementText="SELECT * FROM t" StatementSubTreeCost="1.0">
//!       <QueryPlan>
//!         <RelOp NodeId="0" PhysicalOp="Table Scan" LogicalOp="Table Scan"
//!                EstimateRows="10" EstimateCPU="0.5" EstimateIO="0.5"
//!                EstimatedTotalSubtreeCost="1.0">
//!           <TableScan><Object Schema="[dbo]" Table="[t]"/></TableScan>
//!         </RelOp>
//!       </QueryPlan>
//!     </StmtSimple>
//!   </Statements></Batch></BatchSequence>
//! </ShowPlanXML>"#;
//!
//! let plan = parse_showplan(xml).unwrap();
//! assert_eq!(plan.root.table_name(), Some("t"));
//! ```

use crate::explain::operator::OperatorKind;
use crate::explain::parser::{PlanParser, cost_percentage};
use crate::explain::plan::{
    ExecutionPlan, IndexReference, OperationCost, PlanNode, QueryMetrics, TableReference,
};
use async_trait::async_trait;
use planlens_core::{CancellationToken, PlanEngine, PlanError, Result, ensure_not_cancelled};
use roxmltree::{Document, Node};

/// Namespace every showplan document is declared in
pub const SHOWPLAN_NAMESPACE: &str = "http://schemas.microsoft.com/sqlserver/2004/07/showplan";

/// Elements of a `RelOp` that never carry the operator-specific payload
const NON_OPERATOR_ELEMENTS: &[&str] = &[
    "OutputList",
    "Warnings",
    "MemoryFractions",
    "RunTimeInformation",
    "RunTimePartitionSummary",
    "InternalInfo",
];

/// Parser for SQL Server showplan XML
#[derive(Debug, Default, Clone, Copy)]
pub struct ShowplanParser;

impl ShowplanParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlanParser for ShowplanParser {
    fn engine(&self) -> PlanEngine {
        PlanEngine::SqlServer
    }

    fn can_parse(&self, raw: &str) -> bool {
        let trimmed = raw.trim_start_matches('\u{feff}').trim_start();
        trimmed.starts_with('<') && trimmed.contains(SHOWPLAN_NAMESPACE)
    }

    #[tracing::instrument(skip_all, fields(len = raw.len()))]
    async fn parse(&self, raw: &str, cancel: &CancellationToken) -> Result<ExecutionPlan> {
        ensure_not_cancelled(cancel)?;
        parse_showplan(raw)
    }
}

/// Parses showplan XML into a canonical plan
pub fn parse_showplan(xml: &str) -> Result<ExecutionPlan> {
    let mut text = xml.trim_start_matches('\u{feff}').trim();
    // SQL Server declares utf-16 even though the text has already been decoded
    if text.starts_with("<?xml")
        && let Some(end) = text.find("?>")
    {
        text = text[end + 2..].trim_start();
    }
    let doc = Document::parse(text)?;

    let query_plan = doc
        .descendants()
        .find(|n| is_element(n, "QueryPlan"))
        .ok_or_else(|| PlanError::parse("no QueryPlan element in showplan"))?;
    let root_relop = query_plan
        .children()
        .find(|n| is_element(n, "RelOp"))
        .ok_or_else(|| PlanError::parse("no root RelOp operator in showplan"))?;

    let statement = query_plan.parent_element();
    let statement_cost = statement
        .and_then(|s| attr_f64(s, "StatementSubTreeCost"))
        .or_else(|| attr_f64(root_relop, "EstimatedTotalSubtreeCost"))
        .unwrap_or(0.0);

    let mut builder = NodeBuilder {
        next_id: 0,
        statement_cost,
        logical_reads: 0,
        physical_reads: 0,
    };
    let mut root = builder.build(root_relop, 0);

    if query_plan.children().any(|n| is_element(&n, "MissingIndexes")) {
        root.add_warning("Missing index hint: the optimizer reported a missing index");
    }

    let mut metrics = QueryMetrics {
        total_cost: statement_cost,
        logical_reads: builder.logical_reads,
        physical_reads: builder.physical_reads,
        rows_affected: root.cost.actual_rows.max(0.0) as u64,
        degree_of_parallelism: query_plan
            .attribute("DegreeOfParallelism")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
        ..QueryMetrics::default()
    };
    if let Some(stats) = query_plan.children().find(|n| is_element(n, "QueryTimeStats")) {
        metrics.cpu_time_ms = attr_f64(stats, "CpuTime").unwrap_or(0.0);
        metrics.elapsed_time_ms = attr_f64(stats, "ElapsedTime").unwrap_or(0.0);
    }
    metrics.refresh_operator_counts(&root);

    tracing::debug!(
        nodes = metrics.operator_count,
        total_cost = statement_cost,
        "parsed showplan XML"
    );

    let query_text = statement
        .and_then(|s| s.attribute("StatementText"))
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(ExecutionPlan::new(PlanEngine::SqlServer, root)
        .with_metrics(metrics)
        .with_query_text(query_text)
        .with_raw_plan(xml))
}

struct NodeBuilder {
    next_id: usize,
    statement_cost: f64,
    logical_reads: u64,
    physical_reads: u64,
}

impl NodeBuilder {
    fn build(&mut self, relop: Node<'_, '_>, depth: usize) -> PlanNode {
        let id = self.next_id;
        self.next_id += 1;

        let physical_op = relop.attribute("PhysicalOp").unwrap_or_default();
        let logical_op = relop.attribute("LogicalOp").unwrap_or_default();
        let operator = operator_element(relop);

        let mut kind = OperatorKind::from_showplan(physical_op, logical_op);
        // Pre-2005 plans report key lookups as a clustered index seek with Lookup="1"
        if operator.is_some_and(|op| matches!(op.attribute("Lookup"), Some("1" | "true"))) {
            kind = OperatorKind::KeyLookup;
        }

        let mut node = PlanNode::new(kind, physical_op);
        node.id = id;
        node.depth = depth;
        node.logical_operator = logical_op.to_string();
        node.cost = self.read_cost(relop);

        if let Some(object) = own_elements(relop, "Object").into_iter().next() {
            let (table, index) = read_object(object, relop, kind);
            node.table = table;
            node.index = index;
        }
        node.predicate = read_predicate(relop);
        node.output_columns = relop
            .children()
            .find(|n| is_element(n, "OutputList"))
            .map(|list| {
                list.children()
                    .filter(|n| is_element(n, "ColumnReference"))
                    .filter_map(|c| c.attribute("Column"))
                    .map(strip_brackets)
                    .collect()
            })
            .unwrap_or_default();

        for warning in read_warnings(relop) {
            node.add_warning(warning);
        }

        for key in [
            "NodeId",
            "Parallel",
            "EstimatedExecutionMode",
            "EstimateRebinds",
            "EstimateRewinds",
        ] {
            if let Some(value) = relop.attribute(key) {
                node.properties.insert(key.to_string(), value.to_string());
            }
        }
        if let Some(table) = node.table.as_mut()
            && let Some(cardinality) = attr_f64(relop, "TableCardinality")
        {
            table.estimated_row_count = Some(cardinality.max(0.0) as u64);
        }

        for child in child_relops(relop) {
            let child_node = self.build(child, depth + 1);
            node.children.push(child_node);
        }

        node
    }

    fn read_cost(&mut self, relop: Node<'_, '_>) -> OperationCost {
        let cpu = attr_f64(relop, "EstimateCPU").unwrap_or(0.0);
        let io = attr_f64(relop, "EstimateIO").unwrap_or(0.0);
        let mut cost = OperationCost::default()
            .with_cpu_io(cpu, io)
            .with_estimated_rows(attr_f64(relop, "EstimateRows").unwrap_or(0.0));
        cost.subtree_cost = attr_f64(relop, "EstimatedTotalSubtreeCost").unwrap_or(0.0);
        cost.cost_percentage = cost_percentage(cost.total_cost, self.statement_cost);

        let counters = relop
            .children()
            .find(|n| is_element(n, "RunTimeInformation"))
            .map(|info| {
                info.children()
                    .filter(|n| is_element(n, "RunTimeCountersPerThread"))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if !counters.is_empty() {
            let mut executions = 0.0;
            for thread in counters {
                cost.actual_rows += attr_f64(thread, "ActualRows").unwrap_or(0.0);
                executions += attr_f64(thread, "ActualExecutions").unwrap_or(0.0);
                self.logical_reads += attr_f64(thread, "ActualLogicalReads").unwrap_or(0.0) as u64;
                self.physical_reads +=
                    attr_f64(thread, "ActualPhysicalReads").unwrap_or(0.0) as u64;
            }
            cost.execution_count = (executions as u64).max(1);
        }

        cost
    }
}

/// Reads the `Object` element into table and index references
fn read_object(
    object: Node<'_, '_>,
    relop: Node<'_, '_>,
    kind: OperatorKind,
) -> (Option<TableReference>, Option<IndexReference>) {
    let Some(table_name) = object.attribute("Table").map(strip_brackets) else {
        return (None, None);
    };

    let mut table = TableReference::new(table_name.clone());
    if let Some(schema) = object.attribute("Schema") {
        table.schema = strip_brackets(schema);
    }
    if let Some(alias) = object.attribute("Alias") {
        table.alias = Some(strip_brackets(alias));
    }

    let index = object.attribute("Index").map(|name| {
        let mut index = IndexReference::new(strip_brackets(name), table_name.clone());
        index.is_clustered = object
            .attribute("IndexKind")
            .map(|k| k.eq_ignore_ascii_case("Clustered"))
            .unwrap_or(matches!(
                kind,
                OperatorKind::ClusteredIndexScan
                    | OperatorKind::ClusteredIndexSeek
                    | OperatorKind::KeyLookup
            ));
        index.key_columns = seek_columns(relop);
        index
    });

    (Some(table), index)
}

/// Columns named in the operator's seek keys, in order, without duplicates
fn seek_columns(relop: Node<'_, '_>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for range in own_elements(relop, "RangeColumns") {
        for column in range
            .children()
            .filter(|n| is_element(n, "ColumnReference"))
            .filter_map(|c| c.attribute("Column"))
        {
            let column = strip_brackets(column);
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }
    columns
}

/// Picks the most specific predicate: filter, then seek, then join
/// residual, then hash keys
fn read_predicate(relop: Node<'_, '_>) -> String {
    if let Some(filter) = own_elements(relop, "Predicate")
        .into_iter()
        .find_map(scalar_string)
    {
        return filter;
    }

    // SQL Server 2008+ wraps ranges in SeekKeys; older plans put them
    // directly under SeekPredicate
    let seeks: Vec<String> = own_elements(relop, "SeekKeys")
        .into_iter()
        .chain(own_elements(relop, "SeekPredicate"))
        .flat_map(|keys| keys.children().filter(|n| n.is_element()))
        .filter_map(seek_range_text)
        .collect();
    if !seeks.is_empty() {
        return seeks.join(" AND ");
    }

    if let Some(residual) = own_elements(relop, "Residual")
        .into_iter()
        .chain(own_elements(relop, "ProbeResidual"))
        .find_map(scalar_string)
    {
        return residual;
    }

    let build = hash_key_columns(relop, "HashKeysBuild");
    let probe = hash_key_columns(relop, "HashKeysProbe");
    build
        .iter()
        .zip(probe.iter())
        .map(|(b, p)| format!("{b} = {p}"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Renders one `Prefix`/`StartRange`/`EndRange` seek range as `col op value`
fn seek_range_text(range: Node<'_, '_>) -> Option<String> {
    let op = match range.attribute("ScanType").unwrap_or("EQ") {
        "EQ" => "=",
        "GT" => ">",
        "GE" => ">=",
        "LT" => "<",
        "LE" => "<=",
        "NE" => "<>",
        _ => "=",
    };
    let columns: Vec<String> = range
        .children()
        .find(|n| is_element(n, "RangeColumns"))?
        .children()
        .filter(|n| is_element(n, "ColumnReference"))
        .map(qualified_column)
        .collect();
    let values: Vec<String> = range
        .children()
        .find(|n| is_element(n, "RangeExpressions"))
        .map(|exprs| {
            exprs
                .children()
                .filter(|n| n.is_element())
                .filter_map(|n| n.attribute("ScalarString").map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let parts: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| match values.get(i) {
            Some(value) => format!("{column} {op} {value}"),
            None => column.clone(),
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(" AND "))
}

fn hash_key_columns(relop: Node<'_, '_>, element: &str) -> Vec<String> {
    own_elements(relop, element)
        .into_iter()
        .flat_map(|keys| {
            keys.children()
                .filter(|n| is_element(n, "ColumnReference"))
                .map(qualified_column)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Known warning conditions attached to this operator
fn read_warnings(relop: Node<'_, '_>) -> Vec<String> {
    let mut warnings = Vec::new();
    for element in own_elements(relop, "Warnings") {
        if matches!(element.attribute("NoJoinPredicate"), Some("true" | "1")) {
            warnings.push("No join predicate".to_string());
        }
        for child in element.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "SpillToTempDb" => warnings.push("Operator spilled to tempdb".to_string()),
                "PlanAffectingConvert" => {
                    let expression = child.attribute("Expression").unwrap_or_default();
                    warnings.push(format!("Implicit conversion may affect plan: {expression}"));
                }
                "ColumnsWithNoStatistics" => {
                    warnings.push("Columns with no statistics".to_string())
                }
                _ => {}
            }
        }
    }
    warnings
}

/// The operator-specific child element of a `RelOp`
fn operator_element<'a, 'input>(relop: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    relop
        .children()
        .find(|n| n.is_element() && !NON_OPERATOR_ELEMENTS.contains(&n.tag_name().name()))
}

/// Direct child operators: `RelOp` elements below this one with no other
/// `RelOp` in between
fn child_relops<'a, 'input>(relop: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let mut found = Vec::new();
    collect_until_relop(relop, &mut |n| is_element(&n, "RelOp"), &mut found);
    found
}

/// Elements named `name` that belong to this operator rather than a child
/// operator
fn own_elements<'a, 'input>(relop: Node<'a, 'input>, name: &str) -> Vec<Node<'a, 'input>> {
    let mut found = Vec::new();
    collect_until_relop(relop, &mut |n| is_element(&n, name), &mut found);
    found
}

fn collect_until_relop<'a, 'input, F>(
    node: Node<'a, 'input>,
    matches: &mut F,
    found: &mut Vec<Node<'a, 'input>>,
) where
    F: FnMut(Node<'a, 'input>) -> bool,
{
    for child in node.children().filter(|n| n.is_element()) {
        if matches(child) {
            found.push(child);
        } else if !is_element(&child, "RelOp") {
            collect_until_relop(child, matches, found);
        }
    }
}

fn scalar_string(element: Node<'_, '_>) -> Option<String> {
    element
        .descendants()
        .find(|n| is_element(n, "ScalarOperator"))
        .and_then(|n| n.attribute("ScalarString"))
        .map(str::to_string)
}

/// `[Table].[Column]` when the reference names a table, else `[Column]`
fn qualified_column(column: Node<'_, '_>) -> String {
    let name = column.attribute("Column").unwrap_or_default();
    match column.attribute("Table") {
        Some(table) => format!("{}.[{}]", table, strip_brackets(name)),
        None => format!("[{}]", strip_brackets(name)),
    }
}

fn is_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn attr_f64(node: Node<'_, '_>, name: &str) -> Option<f64> {
    node.attribute(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn strip_brackets(value: &str) -> String {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string()
}
