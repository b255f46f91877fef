//! Implementation of heuristic optimizer.
//!
//! Heuristic optimizer optimizes query plan by applying a batch of rewrite rules to query plan
//! until some condition is met, e.g. max number of iterations or reached fixed point. The
//! implementation is heavily inspired by [apache calcite](https://github.com/apache/calcite)'s
//! HepPlanner.
//!
//! Here it runs before physical planning, so that rewrites such as outer join simplification or
//! min/max elimination are visible to access path and strategy selection.

mod optimizer;
pub use optimizer::*;
mod graph;
pub use graph::*;
mod binding;
pub(crate) use binding::Binding;
