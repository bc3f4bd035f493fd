//! Plan Comparison Module
//!
//! Compares a before plan with an after plan and summarizes whether the
//! change helped.

mod comparator;

pub use comparator::*;
