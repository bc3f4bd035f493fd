//! Plan parser trait and helpers shared by the dialect parsers

use crate::explain::plan::ExecutionPlan;
use async_trait::async_trait;
use planlens_core::{CancellationToken, PlanEngine, Result};

/// Turns raw plan text of one dialect into a canonical `ExecutionPlan`
#[async_trait]
pub trait PlanParser: Send + Sync {
    /// Engine whose dialect this parser understands
    fn engine(&self) -> PlanEngine;

    /// Cheap content sniff; must not fully parse the input
    fn can_parse(&self, raw: &str) -> bool;

    /// Parses the raw text.
    ///
    /// Cancellation is checked once, before any work is done.
    async fn parse(&self, raw: &str, cancel: &CancellationToken) -> Result<ExecutionPlan>;
}

/// `part / total` as a percentage clamped to `[0, 100]`; 0 when the total
/// is not positive or either value is not finite
pub fn cost_percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 && total.is_finite() && part.is_finite() {
        (part / total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}
