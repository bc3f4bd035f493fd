//! planlens Core - Shared abstractions for execution plan analysis
//!
//! This crate provides the types every other planlens crate depends on:
//!
//! - `PlanError` - The error taxonomy (parse failure, unsupported format, cancellation)
//! - `PlanEngine` - Identifies which database engine produced a raw plan
//! - `PlanSource` - Trait for collaborators that fetch raw plan text
//! - Cooperative cancellation helpers built on `CancellationToken`

mod cancel;
mod engine;
mod error;
mod source;

pub use cancel::*;
pub use engine::*;
pub use error::*;
pub use source::*;
