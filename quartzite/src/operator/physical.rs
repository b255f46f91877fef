use std::fmt::{Debug, Display, Formatter};

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

use crate::operator::{
    DisplayFields, Dual, Filter, HashAgg, HashJoin, IndexNestedLoopJoin, Limit, Projection, Sort,
    SortMergeJoin, StreamAgg, TableReader, TopN, Union,
};

/// Physical relational operator.
///
/// Each variant is one executable strategy, the planner picks among them per logical node.
#[derive(Clone, Debug, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum PhysicalOperator {
    PhysicalTableReader(TableReader),
    PhysicalSelection(Filter),
    PhysicalProjection(Projection),
    PhysicalHashJoin(HashJoin),
    PhysicalSortMergeJoin(SortMergeJoin),
    PhysicalIndexNestedLoopJoin(IndexNestedLoopJoin),
    PhysicalHashAgg(HashAgg),
    PhysicalStreamAgg(StreamAgg),
    PhysicalSort(Sort),
    PhysicalTopN(TopN),
    PhysicalLimit(Limit),
    PhysicalUnion(Union),
    PhysicalTableDual(Dual),
}

impl Display for PhysicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}
