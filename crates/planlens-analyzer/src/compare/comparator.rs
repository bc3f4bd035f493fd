//! Plan comparator implementation
//!
//! Compares a plan captured before a change (an index, a rewrite) with the
//! plan captured after it, and reports the cost and structural differences
//! together with a verdict.

use crate::explain::{ExecutionPlan, OperatorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Cost reduction at or above which a change counts as significant
pub const SIGNIFICANT_REDUCTION: f64 = 50.0;
/// Cost change (either way) at or above which a change is not noise
pub const NOTABLE_CHANGE: f64 = 10.0;

/// Overall outcome of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    SignificantImprovement,
    Improved,
    SlightlyImproved,
    NoChange,
    Regressed,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignificantImprovement => "significant improvement",
            Self::Improved => "improved",
            Self::SlightlyImproved => "slightly improved",
            Self::NoChange => "no change",
            Self::Regressed => "regressed",
        }
    }

    /// Returns true for every kind of improvement
    pub fn is_improvement(&self) -> bool {
        matches!(
            self,
            Self::SignificantImprovement | Self::Improved | Self::SlightlyImproved
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing two plans
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanComparison {
    pub before_plan_id: String,
    pub after_plan_id: String,
    pub before_cost: f64,
    pub after_cost: f64,
    /// Positive when the after plan is cheaper; 0 when the before plan has
    /// no cost
    pub cost_reduction_percentage: f64,
    /// Reduction in rows processed, summed over all operators
    pub row_reduction_percentage: f64,
    /// `after - before` operator count
    pub operator_count_delta: i64,
    /// `after - before` bottleneck count
    pub bottleneck_count_delta: i64,
    pub improvements: Vec<String>,
    pub regressions: Vec<String>,
    pub verdict: Verdict,
}

impl PlanComparison {
    /// One-line human readable description of the comparison
    pub fn summary(&self) -> String {
        let direction = if self.cost_reduction_percentage >= 0.0 {
            "lower"
        } else {
            "higher"
        };
        format!(
            "{}: cost {:.4} -> {:.4} ({:.1}% {}), {} improvement(s), {} regression(s)",
            capitalize(self.verdict.as_str()),
            self.before_cost,
            self.after_cost,
            self.cost_reduction_percentage.abs(),
            direction,
            self.improvements.len(),
            self.regressions.len()
        )
    }

    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

/// Compares execution plans
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanComparator;

impl PlanComparator {
    pub fn new() -> Self {
        Self
    }

    /// Compares `before` against `after`. Bottleneck differences use the
    /// findings already stored on each plan.
    pub fn compare(&self, before: &ExecutionPlan, after: &ExecutionPlan) -> PlanComparison {
        let before_cost = before.total_cost();
        let after_cost = after.total_cost();
        let cost_reduction = reduction_percentage(before_cost, after_cost);

        let before_profile = PlanProfile::of(before);
        let after_profile = PlanProfile::of(after);

        let mut improvements = Vec::new();
        let mut regressions = Vec::new();

        compare_counts(&before_profile, &after_profile, &mut improvements, &mut regressions);
        compare_cost(cost_reduction, &mut improvements, &mut regressions);
        compare_elapsed(before, after, &mut improvements, &mut regressions);
        compare_bottlenecks(before, after, &mut improvements, &mut regressions);

        let verdict = verdict(cost_reduction, &improvements, &regressions);

        tracing::debug!(
            before = %before.id,
            after = %after.id,
            cost_reduction,
            verdict = %verdict,
            "compared execution plans"
        );

        PlanComparison {
            before_plan_id: before.id.clone(),
            after_plan_id: after.id.clone(),
            before_cost,
            after_cost,
            cost_reduction_percentage: cost_reduction,
            row_reduction_percentage: reduction_percentage(before_profile.rows, after_profile.rows),
            operator_count_delta: after.node_count() as i64 - before.node_count() as i64,
            bottleneck_count_delta: after.bottlenecks.len() as i64
                - before.bottlenecks.len() as i64,
            improvements,
            regressions,
            verdict,
        }
    }
}

/// Operator counts and row volume of one plan
struct PlanProfile {
    scans: usize,
    seeks: usize,
    key_lookups: usize,
    rows: f64,
}

impl PlanProfile {
    fn of(plan: &ExecutionPlan) -> Self {
        let mut profile = Self {
            scans: 0,
            seeks: 0,
            key_lookups: 0,
            rows: 0.0,
        };
        for node in plan.iter_nodes() {
            if node.kind.is_scan() {
                profile.scans += 1;
            } else if node.kind.is_seek() {
                profile.seeks += 1;
            } else if node.kind == OperatorKind::KeyLookup {
                profile.key_lookups += 1;
            }
            profile.rows += node.cost.effective_rows();
        }
        profile
    }
}

fn reduction_percentage(before: f64, after: f64) -> f64 {
    if before > 0.0 && after.is_finite() {
        (before - after) / before * 100.0
    } else {
        0.0
    }
}

fn compare_counts(
    before: &PlanProfile,
    after: &PlanProfile,
    improvements: &mut Vec<String>,
    regressions: &mut Vec<String>,
) {
    if after.scans < before.scans {
        improvements.push(format!(
            "Scans reduced from {} to {}",
            before.scans, after.scans
        ));
    } else if after.scans > before.scans {
        regressions.push(format!(
            "Scans increased from {} to {}",
            before.scans, after.scans
        ));
    }

    if after.seeks > before.seeks {
        improvements.push(format!(
            "Seeks increased from {} to {}",
            before.seeks, after.seeks
        ));
    }

    if after.key_lookups < before.key_lookups {
        improvements.push(format!(
            "Key lookups reduced from {} to {}",
            before.key_lookups, after.key_lookups
        ));
    }
}

fn compare_cost(reduction: f64, improvements: &mut Vec<String>, regressions: &mut Vec<String>) {
    if reduction >= SIGNIFICANT_REDUCTION {
        improvements.push(format!("Estimated cost cut by {reduction:.1}%"));
    } else if reduction >= NOTABLE_CHANGE {
        improvements.push(format!("Estimated cost reduced by {reduction:.1}%"));
    } else if reduction <= -SIGNIFICANT_REDUCTION {
        regressions.push(format!("Estimated cost rose sharply by {:.1}%", -reduction));
    } else if reduction <= -NOTABLE_CHANGE {
        regressions.push(format!("Estimated cost increased by {:.1}%", -reduction));
    }
}

fn compare_elapsed(
    before: &ExecutionPlan,
    after: &ExecutionPlan,
    improvements: &mut Vec<String>,
    regressions: &mut Vec<String>,
) {
    let before_ms = before.metrics.elapsed_time_ms;
    let after_ms = after.metrics.elapsed_time_ms;
    if before_ms <= 0.0 || after_ms <= 0.0 {
        return;
    }

    if after_ms < before_ms {
        improvements.push(format!(
            "Elapsed time {:.1}x faster ({before_ms:.1} ms -> {after_ms:.1} ms)",
            before_ms / after_ms
        ));
    } else if after_ms > before_ms {
        regressions.push(format!(
            "Elapsed time {:.1}x slower ({before_ms:.1} ms -> {after_ms:.1} ms)",
            after_ms / before_ms
        ));
    }
}

fn compare_bottlenecks(
    before: &ExecutionPlan,
    after: &ExecutionPlan,
    improvements: &mut Vec<String>,
    regressions: &mut Vec<String>,
) {
    let before_titles = severe_titles(before);
    let after_titles = severe_titles(after);

    for title in before_titles.difference(&after_titles) {
        improvements.push(format!("Resolved: {title}"));
    }
    for title in after_titles.difference(&before_titles) {
        regressions.push(format!("New bottleneck: {title}"));
    }
}

fn severe_titles(plan: &ExecutionPlan) -> BTreeSet<&str> {
    plan.bottlenecks
        .iter()
        .filter(|b| b.severity.is_high_or_above())
        .map(|b| b.title.as_str())
        .collect()
}

fn verdict(cost_reduction: f64, improvements: &[String], regressions: &[String]) -> Verdict {
    if cost_reduction >= SIGNIFICANT_REDUCTION && regressions.is_empty() {
        Verdict::SignificantImprovement
    } else if cost_reduction >= NOTABLE_CHANGE {
        Verdict::Improved
    } else if cost_reduction <= -NOTABLE_CHANGE {
        Verdict::Regressed
    } else if improvements.len() > regressions.len() {
        Verdict::SlightlyImproved
    } else {
        Verdict::NoChange
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests;
