//! planlens Analyzer - Execution plan parsing and analysis
//!
//! This crate provides functionality for:
//! - Parsing SQL Server showplan XML and PostgreSQL JSON EXPLAIN output
//!   into one canonical plan tree
//! - Cost queries, bottleneck detection and index suggestions over that tree
//! - Before/after plan comparison
//! - Layered tree layout for rendering a plan as a graph

pub mod analysis;
pub mod compare;
pub mod explain;
pub mod layout;
pub mod pipeline;
pub mod settings;

#[cfg(test)]
mod test_fixtures;

pub use analysis::*;
pub use compare::*;
pub use explain::*;
pub use layout::*;
pub use pipeline::*;
pub use settings::*;

pub use planlens_core::{CancellationToken, PlanEngine, PlanError, PlanSource, Result};
