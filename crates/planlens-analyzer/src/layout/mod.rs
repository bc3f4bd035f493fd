//! Plan Layout Module
//!
//! Computes node positions and edge endpoints for drawing a plan tree as a
//! top-down graph. Rendering is left to the caller.

mod engine;

pub use engine::*;
