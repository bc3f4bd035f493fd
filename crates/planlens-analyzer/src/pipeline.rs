//! End-to-end plan analysis
//!
//! Fetches a plan through a [`PlanSource`], normalizes it, runs the analysis
//! passes and computes a layout, returning everything a presentation layer
//! needs in one [`PlanAnalysisReport`].

use crate::analysis::{CostSummary, PlanAnalyzer};
use crate::explain::{ExecutionPlan, PlanNormalizer};
use crate::layout::{LayoutEngine, LayoutResult};
use crate::settings::AnalyzerSettings;
use planlens_core::{CancellationToken, PlanSource, Result, ensure_not_cancelled};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAnalysisReport {
    /// Normalized plan carrying its bottlenecks and index suggestions
    pub plan: ExecutionPlan,
    pub layout: LayoutResult,
    pub cost_summary: CostSummary,
}

/// Fetch, normalize, analyze and lay out a plan
pub struct PlanAnalysisPipeline {
    source: Arc<dyn PlanSource>,
    normalizer: PlanNormalizer,
    analyzer: PlanAnalyzer,
    layout: LayoutEngine,
}

impl std::fmt::Debug for PlanAnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanAnalysisPipeline")
            .field("engine", &self.source.engine())
            .field("normalizer", &self.normalizer)
            .field("analyzer", &self.analyzer)
            .field("layout", &self.layout)
            .finish()
    }
}

impl PlanAnalysisPipeline {
    /// Creates a pipeline with default settings
    pub fn new(source: Arc<dyn PlanSource>) -> Self {
        Self::with_settings(source, AnalyzerSettings::default())
    }

    pub fn with_settings(source: Arc<dyn PlanSource>, settings: AnalyzerSettings) -> Self {
        let layout = LayoutEngine::with_config(settings.layout);
        Self {
            source,
            normalizer: PlanNormalizer::new(),
            analyzer: PlanAnalyzer::with_settings(settings),
            layout,
        }
    }

    /// Replaces the normalizer, e.g. one with extra parsers registered
    pub fn with_normalizer(mut self, normalizer: PlanNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn analyzer(&self) -> &PlanAnalyzer {
        &self.analyzer
    }

    /// Fetches the plan for `query` and analyzes it
    #[tracing::instrument(skip(self, query, cancel), fields(engine = %self.source.engine()))]
    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> Result<PlanAnalysisReport> {
        ensure_not_cancelled(cancel)?;

        let raw = self.source.fetch_plan(query, cancel).await?;
        tracing::debug!(len = raw.len(), "fetched raw plan");

        let mut report = self.analyze_raw(&raw, cancel).await?;
        if report.plan.query_text.is_empty() {
            report.plan.query_text = query.to_string();
        }
        Ok(report)
    }

    /// Analyzes plan text that was obtained elsewhere
    pub async fn analyze_raw(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<PlanAnalysisReport> {
        let mut plan = self.normalizer.normalize(raw, cancel).await?;
        if plan.engine != self.source.engine() {
            tracing::warn!(
                expected = %self.source.engine(),
                actual = %plan.engine,
                "plan dialect differs from the source engine"
            );
        }

        self.analyzer.analyze(&mut plan, cancel)?;
        let layout = self.layout.layout_plan(&plan);
        let cost_summary = self.analyzer.cost_summary(&plan);

        tracing::info!(
            plan_id = %plan.id,
            bottlenecks = plan.bottlenecks.len(),
            "plan analysis complete"
        );

        Ok(PlanAnalysisReport {
            plan,
            layout,
            cost_summary,
        })
    }
}
