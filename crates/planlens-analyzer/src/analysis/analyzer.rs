//! Plan Analyzer - runs the analysis passes over a plan
//!
//! The bottleneck detector runs first and may flag nodes as warnings; the
//! index advisor then runs over the same plan. The passes run one after the
//! other on a single plan, while independent plans can be analyzed in
//! parallel with [`PlanAnalyzer::analyze_many`].

use crate::analysis::bottleneck::{BottleneckDetector, mark_warnings};
use crate::analysis::cost::{CostAnalyzer, CostSummary};
use crate::analysis::index_advisor::IndexAdvisor;
use crate::explain::{ExecutionPlan, PlanNode};
use crate::settings::AnalyzerSettings;
use planlens_core::{CancellationToken, Result, ensure_not_cancelled};
use rayon::prelude::*;

/// Runs bottleneck detection and index advice over plans
#[derive(Debug, Clone, Default)]
pub struct PlanAnalyzer {
    settings: AnalyzerSettings,
    detector: BottleneckDetector,
    advisor: IndexAdvisor,
}

impl PlanAnalyzer {
    /// Creates an analyzer with default settings
    pub fn new() -> Self {
        Self::with_settings(AnalyzerSettings::default())
    }

    /// Creates an analyzer with custom settings
    pub fn with_settings(settings: AnalyzerSettings) -> Self {
        let advisor = IndexAdvisor::new().with_max_included_columns(settings.max_included_columns);
        Self {
            settings,
            detector: BottleneckDetector::new(),
            advisor,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Detects bottlenecks and proposes indexes, storing both on the plan.
    ///
    /// Replaces any results from an earlier run. Nothing is modified when
    /// `cancel` has already fired.
    #[tracing::instrument(skip(self, plan, cancel), fields(plan_id = %plan.id))]
    pub fn analyze(&self, plan: &mut ExecutionPlan, cancel: &CancellationToken) -> Result<()> {
        ensure_not_cancelled(cancel)?;

        let bottlenecks = self.detector.detect(plan);
        if self.settings.mark_warnings {
            mark_warnings(plan, &bottlenecks);
        }
        plan.bottlenecks = bottlenecks;
        plan.index_suggestions = self.advisor.suggest(plan);

        tracing::info!(
            bottlenecks = plan.bottlenecks.len(),
            index_suggestions = plan.index_suggestions.len(),
            "analyzed execution plan"
        );
        Ok(())
    }

    /// Analyzes independent plans in parallel, each on its own thread
    pub fn analyze_many(
        &self,
        plans: &mut [ExecutionPlan],
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_not_cancelled(cancel)?;
        plans
            .par_iter_mut()
            .try_for_each(|plan| self.analyze(plan, cancel))
    }

    /// Operations at or above the configured expensive threshold
    pub fn expensive_operations<'a>(&self, plan: &'a ExecutionPlan) -> Vec<&'a PlanNode> {
        CostAnalyzer::new(plan).expensive_operations(self.settings.expensive_threshold)
    }

    /// Cost profile using the configured expensive threshold
    pub fn cost_summary(&self, plan: &ExecutionPlan) -> CostSummary {
        CostAnalyzer::new(plan).summary(self.settings.expensive_threshold)
    }
}

#[cfg(test)]
mod tests;
