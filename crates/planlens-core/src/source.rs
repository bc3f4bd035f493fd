//! Plan acquisition trait
//!
//! Fetching a raw plan from a live database belongs to a connector outside
//! this workspace. The connector implements `PlanSource`, and the analysis
//! pipeline consumes the returned text.

use crate::{CancellationToken, PlanEngine, Result};
use async_trait::async_trait;

/// Collaborator that produces raw execution plan text for a query.
///
/// Implementations own retries and timeouts; a returned error is treated as
/// terminal for that query.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Engine whose plan dialect this source returns
    fn engine(&self) -> PlanEngine;

    /// Fetches the raw plan text for `query`.
    ///
    /// Implementations should return `PlanError::Cancelled` when `cancel`
    /// fires and `PlanError::Source` for connection or server failures.
    async fn fetch_plan(&self, query: &str, cancel: &CancellationToken) -> Result<String>;
}
