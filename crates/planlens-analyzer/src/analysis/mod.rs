//! Plan Analysis Module
//!
//! Independent passes over a canonical plan:
//! - Cost queries (expensive, CPU-bound and IO-bound operations)
//! - Bottleneck detection with severity ranking
//! - Index suggestions derived from scans and key lookups

pub mod analyzer;
pub mod bottleneck;
pub mod cost;
pub mod index_advisor;
pub mod predicate;

pub use analyzer::PlanAnalyzer;
pub use bottleneck::{BottleneckDetector, BottleneckRule, mark_warnings, rank};
pub use cost::{CostAnalyzer, CostSummary, DEFAULT_EXPENSIVE_THRESHOLD};
pub use index_advisor::{IndexAdvisor, IndexRule, deduplicate, scan_improvement};
pub use predicate::extract_predicate_columns;
