use enum_as_inner::EnumAsInner;
use std::fmt::{Display, Formatter};

use crate::operator::{
    Aggregate, DisplayFields, Dual, Filter, Join, Limit, Projection, Scan, Sort, TopN, Union,
};
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

/// Logical relational operator.
#[derive(Clone, Debug, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum LogicalOperator {
    LogicalLimit(Limit),
    LogicalTopN(TopN),
    LogicalSort(Sort),
    LogicalFilter(Filter),
    LogicalProjection(Projection),
    LogicalJoin(Join),
    LogicalAggregate(Aggregate),
    LogicalUnion(Union),
    LogicalScan(Scan),
    LogicalDual(Dual),
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}
