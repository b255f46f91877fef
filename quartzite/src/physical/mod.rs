//! Physical planning.
//!
//! The [`PhysicalPlanner`] walks a rewritten logical plan bottom up. Table reads get an access
//! path from [`AccessPathEnumerator`], joins and aggregations get an algorithm, and order and
//! limit requirements of parents are pushed into children where some child can satisfy them.
//! Hints restrict the alternatives considered, an inapplicable hint leaves a warning and cost
//! decides instead.

mod access_path;
pub use access_path::*;
mod agg;
mod join;
mod join_order;
mod planner;
pub use planner::*;
