use std::fmt::{Display, Formatter};

use datafusion_common::Column;
use datafusion_expr::{Expr, JoinType};
use strum_macros::AsRefStr;

use crate::error::QuartziteResult;
use crate::hint::QueryBlockId;
use crate::operator::{input_at, DisplayFields, DisplayList, DisplayValue, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Equality join key, left column and right column.
pub type JoinKey = (Column, Column);

fn display_keys(on: &[JoinKey]) -> Vec<String> {
    on.iter().map(|(l, r)| format!("{} = {}", l, r)).collect()
}

/// Logical join operator.
#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    join_type: JoinType,
    on: Vec<JoinKey>,
    filter: Option<Expr>,
    /// `NOT IN` style semi/anti join, a NULL key makes the comparison unknown rather than false.
    null_aware: bool,
    block: QueryBlockId,
}

impl Join {
    pub fn new(join_type: JoinType, on: Vec<JoinKey>, block: QueryBlockId) -> Self {
        Self {
            join_type,
            on,
            filter: None,
            null_aware: false,
            block,
        }
    }

    pub fn with_filter(mut self, filter: Option<Expr>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_null_aware(mut self, null_aware: bool) -> Self {
        self.null_aware = null_aware;
        self
    }

    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn on(&self) -> &[JoinKey] {
        &self.on
    }

    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    pub fn null_aware(&self) -> bool {
        self.null_aware
    }

    pub fn block(&self) -> QueryBlockId {
        self.block
    }
}

impl OperatorTrait for Join {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        let left_prop = input_at(inputs, 0)?;
        let right_prop = input_at(inputs, 1)?;

        match self.join_type {
            JoinType::LeftSemi | JoinType::LeftAnti => Ok(left_prop.clone()),
            JoinType::RightSemi | JoinType::RightAnti => Ok(right_prop.clone()),
            _ => Ok(LogicalProperty::new(
                left_prop.schema().join(right_prop.schema())?,
            )),
        }
    }
}

impl DisplayFields for Join {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("join_type", &self.join_type);
        s.field("on", &DisplayList(&display_keys(&self.on)));
        if let Some(filter) = &self.filter {
            s.field("filter", &DisplayValue(filter));
        }
        if self.null_aware {
            s.field("null_aware", &true);
        }
        s.finish()
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr)]
pub enum JoinSide {
    Left,
    Right,
}

impl JoinSide {
    pub fn other(self) -> Self {
        match self {
            JoinSide::Left => JoinSide::Right,
            JoinSide::Right => JoinSide::Left,
        }
    }

    pub fn index(self) -> usize {
        match self {
            JoinSide::Left => 0,
            JoinSide::Right => 1,
        }
    }
}

impl Display for JoinSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Fields shared by physical join strategies.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinCondition {
    pub join_type: JoinType,
    pub on: Vec<JoinKey>,
    pub filter: Option<Expr>,
}

impl From<&Join> for JoinCondition {
    fn from(join: &Join) -> Self {
        Self {
            join_type: join.join_type,
            on: join.on.clone(),
            filter: join.filter.clone(),
        }
    }
}

impl JoinCondition {
    fn display_into(&self, s: &mut std::fmt::DebugStruct<'_, '_>) {
        s.field("join_type", &self.join_type);
        s.field("on", &DisplayList(&display_keys(&self.on)));
        if let Some(filter) = &self.filter {
            s.field("filter", &DisplayValue(filter));
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HashJoin {
    condition: JoinCondition,
    build_side: JoinSide,
}

impl HashJoin {
    pub fn new(condition: JoinCondition, build_side: JoinSide) -> Self {
        Self {
            condition,
            build_side,
        }
    }

    pub fn condition(&self) -> &JoinCondition {
        &self.condition
    }

    pub fn build_side(&self) -> JoinSide {
        self.build_side
    }
}

impl DisplayFields for HashJoin {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        self.condition.display_into(&mut s);
        s.field("build", &DisplayValue(self.build_side));
        s.finish()
    }
}

/// Merge join over inputs sorted ascending on join keys.
#[derive(Clone, Debug, PartialEq)]
pub struct SortMergeJoin {
    condition: JoinCondition,
}

impl SortMergeJoin {
    pub fn new(condition: JoinCondition) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &JoinCondition {
        &self.condition
    }
}

impl DisplayFields for SortMergeJoin {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        self.condition.display_into(&mut s);
        s.finish()
    }
}

/// Probes the inner input once per outer row through an index on the join keys.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexNestedLoopJoin {
    condition: JoinCondition,
    inner_side: JoinSide,
    /// Inner key columns bound by each probe, in index order.
    lookup_keys: Vec<Column>,
}

impl IndexNestedLoopJoin {
    pub fn new(condition: JoinCondition, inner_side: JoinSide, lookup_keys: Vec<Column>) -> Self {
        Self {
            condition,
            inner_side,
            lookup_keys,
        }
    }

    pub fn condition(&self) -> &JoinCondition {
        &self.condition
    }

    pub fn inner_side(&self) -> JoinSide {
        self.inner_side
    }

    pub fn lookup_keys(&self) -> &[Column] {
        &self.lookup_keys
    }
}

impl DisplayFields for IndexNestedLoopJoin {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        self.condition.display_into(&mut s);
        s.field("inner", &DisplayValue(self.inner_side));
        s.field("lookup_keys", &DisplayList(&self.lookup_keys));
        s.finish()
    }
}
