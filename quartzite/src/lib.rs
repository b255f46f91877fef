//! ## Background
//!
//! Quartzite is the physical optimizer of a distributed SQL engine. It accepts a logical plan
//! produced by the binder together with optimizer hints, and outputs a physical plan with access
//! paths, join algorithms and aggregation strategies chosen.
//!
//! Optimization runs in two phases. Rewrite rules are applied by the [`heuristic`] optimizer
//! until the plan no longer changes, for example eliminating `MIN`/`MAX` with an ordered limit or
//! turning outer joins into inner joins when a filter rejects null rows. The [`physical`] planner
//! then enumerates alternatives of each operator bottom up and keeps the cheapest one per required
//! order, in the spirit of [1].
//!
//! ## Design
//!
//! * [`hint`] Hint parsing and resolution against query blocks.
//! * [`range`] Key range derivation from filter predicates.
//! * [`heuristic`] Heuristic optimizer driving rewrite rules.
//! * [`rules`] Rewrite rule definition and implementation.
//! * [`physical`] Access paths and strategy selection.
//! * [`operator`] Relational operators.
//! * [`properties`] Logical and physical properties.
//! * [`optimizer`] Entry point, [`optimizer::optimize`].
//!
//! ## Reference
//!
//! 1. Selinger, P. Griffiths, et al. "Access path selection in a relational database management
//! system." Readings in Artificial Intelligence and Databases. Morgan Kaufmann, 1989. 511-522.

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod expr;
pub mod heuristic;
pub mod hint;
pub mod operator;
pub mod optimizer;
pub mod physical;
pub mod plan;
pub mod properties;
pub mod range;
pub mod rules;
pub mod stat;
pub mod warning;

#[cfg(test)]
mod test_utils;
