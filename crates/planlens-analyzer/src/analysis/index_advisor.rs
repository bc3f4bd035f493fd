//! Index Advisor
//!
//! Proposes indexes from two kinds of evidence in a plan:
//!
//! - Full scans on a known table, keyed on the columns their predicate
//!   filters on (or on the first output columns when no predicate column
//!   can be found)
//! - Key lookups, whose fetched columns can be added as included columns
//!   to the index of a seek on the same table
//!
//! Proposals for the same table and key-column set are collapsed, keeping
//! the one with the highest estimated improvement.

use crate::analysis::predicate::extract_predicate_columns;
use crate::explain::{ExecutionPlan, IndexSuggestion, PlanNode, Severity};
use std::collections::BTreeSet;

/// Scans reading fewer rows are not worth indexing
pub const MIN_SCAN_ROWS: f64 = 100.0;
/// Default cap on included columns per suggestion
pub const DEFAULT_MAX_INCLUDED_COLUMNS: usize = 5;
/// Fixed improvement estimate for covering a key lookup
pub const LOOKUP_IMPROVEMENT: f64 = 40.0;

/// Number of output columns used as keys when the predicate names none
const FALLBACK_KEY_COLUMNS: usize = 2;

/// A rule inspects one node of a plan and optionally proposes an index
pub type IndexRule = fn(&IndexAdvisor, &ExecutionPlan, &PlanNode) -> Option<IndexSuggestion>;

const RULES: &[IndexRule] = &[IndexAdvisor::scan_driven, IndexAdvisor::lookup_driven];

/// Proposes indexes for a plan
#[derive(Debug, Clone)]
pub struct IndexAdvisor {
    max_included_columns: usize,
}

impl Default for IndexAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexAdvisor {
    pub fn new() -> Self {
        Self {
            max_included_columns: DEFAULT_MAX_INCLUDED_COLUMNS,
        }
    }

    /// Sets the cap on included columns per suggestion
    pub fn with_max_included_columns(mut self, max: usize) -> Self {
        self.max_included_columns = max;
        self
    }

    pub fn max_included_columns(&self) -> usize {
        self.max_included_columns
    }

    /// Runs every rule over every node, then deduplicates. Suggestions are
    /// returned highest estimated improvement first.
    pub fn suggest(&self, plan: &ExecutionPlan) -> Vec<IndexSuggestion> {
        let candidates: Vec<IndexSuggestion> = plan
            .iter_nodes()
            .flat_map(|node| RULES.iter().filter_map(move |rule| rule(self, plan, node)))
            .collect();

        let candidate_count = candidates.len();
        let mut suggestions = deduplicate(candidates);
        suggestions.sort_by(|a, b| b.estimated_improvement.total_cmp(&a.estimated_improvement));

        tracing::debug!(
            plan_id = %plan.id,
            candidates = candidate_count,
            suggestions = suggestions.len(),
            "generated index suggestions"
        );
        suggestions
    }

    fn scan_driven(&self, _plan: &ExecutionPlan, node: &PlanNode) -> Option<IndexSuggestion> {
        let table = node.table.as_ref()?;
        let rows = node.cost.effective_rows();
        if !node.kind.is_full_scan() || rows < MIN_SCAN_ROWS {
            return None;
        }

        let predicate_columns = extract_predicate_columns(&node.predicate);
        let from_predicate = !predicate_columns.is_empty();
        let key_columns = if from_predicate {
            predicate_columns
        } else {
            node.output_columns
                .iter()
                .take(FALLBACK_KEY_COLUMNS)
                .cloned()
                .collect()
        };
        if key_columns.is_empty() {
            return None;
        }

        let included = self.included_columns(&node.output_columns, &key_columns);
        let improvement = scan_improvement(rows, key_columns.len());
        let reason = if from_predicate {
            format!(
                "{} on {} reads {:.0} rows to filter on {}",
                node.kind.display_name(),
                table.name,
                rows,
                key_columns.join(", ")
            )
        } else {
            format!(
                "{} on {} reads {:.0} rows returning {}",
                node.kind.display_name(),
                table.name,
                rows,
                key_columns.join(", ")
            )
        };

        Some(
            IndexSuggestion::new(&table.schema, &table.name, key_columns, reason)
                .with_included_columns(included)
                .with_improvement(improvement, Severity::from_improvement(improvement)),
        )
    }

    fn lookup_driven(&self, plan: &ExecutionPlan, node: &PlanNode) -> Option<IndexSuggestion> {
        if !node.kind.is_lookup() {
            return None;
        }
        let table = node.table.as_ref()?;

        let seek = plan.iter_nodes().find(|n| {
            n.kind.is_seek()
                && n.table_name()
                    .is_some_and(|name| name.eq_ignore_ascii_case(&table.name))
        })?;

        let key_columns = seek
            .index
            .as_ref()
            .map(|idx| idx.key_columns.clone())
            .filter(|keys| !keys.is_empty())
            .unwrap_or_else(|| extract_predicate_columns(&seek.predicate));
        if key_columns.is_empty() {
            return None;
        }

        let included = self.included_columns(&node.output_columns, &key_columns);
        if included.is_empty() {
            return None;
        }

        let index_name = seek
            .index
            .as_ref()
            .map(|idx| idx.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("the existing index");
        let reason = format!(
            "key lookup on {} fetches {}; include them in {} to make it covering",
            table.name,
            included.join(", "),
            index_name
        );

        Some(
            IndexSuggestion::new(&table.schema, &table.name, key_columns, reason)
                .with_included_columns(included)
                .with_improvement(LOOKUP_IMPROVEMENT, Severity::Medium),
        )
    }

    /// Output columns that are not keys, without duplicates, capped
    fn included_columns(&self, output_columns: &[String], key_columns: &[String]) -> Vec<String> {
        let mut included: Vec<String> = Vec::new();
        for column in output_columns {
            let is_key = key_columns.iter().any(|k| k.eq_ignore_ascii_case(column));
            let seen = included.iter().any(|c| c.eq_ignore_ascii_case(column));
            if !is_key && !seen {
                included.push(column.clone());
            }
        }
        included.truncate(self.max_included_columns);
        included
    }
}

/// Estimated improvement for indexing a scan of `rows` rows on
/// `key_count` key columns
pub fn scan_improvement(rows: f64, key_count: usize) -> f64 {
    let keys = key_count as f64;
    let improvement = if rows <= 100.0 {
        20.0
    } else if rows <= 1_000.0 {
        50.0 + 5.0 * keys
    } else if rows <= 10_000.0 {
        80.0 + 2.0 * keys
    } else {
        95.0 + keys.min(4.0)
    };
    improvement.min(100.0)
}

/// Keeps one suggestion per table and key-column set (case-insensitive),
/// preferring the highest estimated improvement. The first occurrence wins
/// a tie and groups keep first-seen order.
pub fn deduplicate(suggestions: Vec<IndexSuggestion>) -> Vec<IndexSuggestion> {
    let mut kept: Vec<(DedupKey, IndexSuggestion)> = Vec::new();

    for suggestion in suggestions {
        let key = dedup_key(&suggestion);
        match kept.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                if suggestion.estimated_improvement > existing.estimated_improvement {
                    *existing = suggestion;
                }
            }
            None => kept.push((key, suggestion)),
        }
    }

    kept.into_iter().map(|(_, s)| s).collect()
}

type DedupKey = (String, BTreeSet<String>);

fn dedup_key(suggestion: &IndexSuggestion) -> DedupKey {
    (
        suggestion.table.to_lowercase(),
        suggestion
            .key_columns
            .iter()
            .map(|c| c.to_lowercase())
            .collect(),
    )
}
