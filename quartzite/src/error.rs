use datafusion_common::Column;
use thiserror::Error;

pub type QuartziteResult<T> = anyhow::Result<T>;
pub type DFResult<T> = datafusion_common::Result<T>;

/// Fatal planning failures.
///
/// These abort planning of the statement. Anything recoverable, such as a hint naming an unknown
/// table or a predicate the range builder can't represent, is reported as a
/// [`crate::warning::PlanWarning`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("table {0:?} doesn't exist in catalog")]
    UnknownTable(String),
    #[error("column {0} can't be resolved")]
    UnknownColumn(Column),
    #[error("join key {0} has no defined ordering")]
    UnorderableJoinKey(Column),
    #[error("invalid logical plan: {0}")]
    InvalidPlan(String),
}
