//! Plan Normalizer
//!
//! Picks the parser whose content sniff accepts the raw text, parses it, and
//! harmonizes the result so plans from both dialects look alike: labels use
//! one vocabulary, every node carries a cost percentage, and ids run
//! `0..n` in pre-order.

use crate::explain::operator::OperatorKind;
use crate::explain::parser::{PlanParser, cost_percentage};
use crate::explain::plan::{ExecutionPlan, PlanNode};
use crate::explain::postgres::PostgresJsonParser;
use crate::explain::showplan::ShowplanParser;
use planlens_core::{CancellationToken, PlanEngine, PlanError, Result, ensure_not_cancelled};

/// Dialect-specific labels rewritten to the shared vocabulary
const LABEL_REWRITES: &[(&str, &str)] = &[
    ("Nested Loop", "Nested Loops"),
    ("Limit", "Top"),
    ("Gather", "Parallelism"),
    ("Gather Merge", "Parallelism"),
    ("Append", "Concatenation"),
];

/// Below this, the parser is assumed not to have set cost percentages
const EMPTY_PERCENTAGE_EPSILON: f64 = 0.001;

/// Dispatches raw plan text to the matching parser
pub struct PlanNormalizer {
    parsers: Vec<Box<dyn PlanParser>>,
}

impl Default for PlanNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlanNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanNormalizer")
            .field(
                "engines",
                &self.parsers.iter().map(|p| p.engine()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PlanNormalizer {
    /// Creates a normalizer for SQL Server showplan XML and PostgreSQL JSON
    pub fn new() -> Self {
        Self::with_parsers(vec![
            Box::new(ShowplanParser::new()),
            Box::new(PostgresJsonParser::new()),
        ])
    }

    /// Creates a normalizer over an explicit parser list, tried in order
    pub fn with_parsers(parsers: Vec<Box<dyn PlanParser>>) -> Self {
        Self { parsers }
    }

    /// Appends a parser, tried after the existing ones
    pub fn register(&mut self, parser: impl PlanParser + 'static) {
        self.parsers.push(Box::new(parser));
    }

    /// Returns the first parser whose sniff accepts `raw`
    pub fn detect(&self, raw: &str) -> Option<&dyn PlanParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(raw))
            .map(|p| p.as_ref())
    }

    /// Engine of the first parser that accepts `raw`
    pub fn detect_engine(&self, raw: &str) -> Option<PlanEngine> {
        self.detect(raw).map(|p| p.engine())
    }

    /// Parses `raw` with the matching parser and harmonizes the result
    #[tracing::instrument(skip(self, raw, cancel), fields(len = raw.len()))]
    pub async fn normalize(&self, raw: &str, cancel: &CancellationToken) -> Result<ExecutionPlan> {
        ensure_not_cancelled(cancel)?;

        let Some(parser) = self.detect(raw) else {
            tracing::debug!("no parser accepted the plan text");
            return Err(PlanError::UnsupportedFormat);
        };

        let mut plan = parser.parse(raw, cancel).await?;
        harmonize(&mut plan);

        tracing::debug!(
            engine = %plan.engine,
            nodes = plan.metrics.operator_count,
            "normalized execution plan"
        );
        Ok(plan)
    }
}

/// Harmonizes labels, cost percentages, ids, depths and operator counts
pub fn harmonize(plan: &mut ExecutionPlan) {
    plan.root.visit_mut(&mut harmonize_label);

    let pct_sum: f64 = plan.iter_nodes().map(|n| n.cost.cost_percentage).sum();
    if pct_sum < EMPTY_PERCENTAGE_EPSILON {
        let total = plan.total_cost();
        plan.root.visit_mut(&mut |node| {
            node.cost.cost_percentage = cost_percentage(node.cost.total_cost, total);
        });
    }

    let mut next_id = 0;
    plan.root.assign_depths(0);
    plan.root.visit_mut(&mut |node| {
        node.id = next_id;
        next_id += 1;
    });

    plan.metrics.refresh_operator_counts(&plan.root);
}

fn harmonize_label(node: &mut PlanNode) {
    if node.label.is_empty() {
        node.label = node.operator_name.clone();
    }

    if node.kind == OperatorKind::SequentialScan {
        node.label = "Table Scan".to_string();
        return;
    }

    if let Some((_, shared)) = LABEL_REWRITES.iter().find(|(raw, _)| *raw == node.label) {
        node.label = (*shared).to_string();
    }
}
