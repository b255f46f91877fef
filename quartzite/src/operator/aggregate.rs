use std::collections::HashMap;
use std::fmt::Formatter;

use datafusion_common::{DFField, DFSchema};
use datafusion_expr::{Expr, ExprSchemable};

use crate::error::{DFResult, QuartziteResult};
use crate::hint::QueryBlockId;
use crate::operator::{input_at, DisplayFields, DisplayList, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Logical aggregation. Output columns are group by expressions followed by aggregates.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    group_by: Vec<Expr>,
    aggr: Vec<Expr>,
    block: QueryBlockId,
}

impl Aggregate {
    pub fn new(group_by: Vec<Expr>, aggr: Vec<Expr>, block: QueryBlockId) -> Self {
        Self {
            group_by,
            aggr,
            block,
        }
    }

    pub fn group_by(&self) -> &[Expr] {
        &self.group_by
    }

    pub fn aggr(&self) -> &[Expr] {
        &self.aggr
    }

    pub fn block(&self) -> QueryBlockId {
        self.block
    }
}

impl OperatorTrait for Aggregate {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        let input_schema = input_at(inputs, 0)?.schema();
        let fields = self
            .group_by
            .iter()
            .chain(self.aggr.iter())
            .map(|e| e.to_field(input_schema))
            .collect::<DFResult<Vec<DFField>>>()?;

        Ok(LogicalProperty::new(DFSchema::new_with_metadata(
            fields,
            HashMap::new(),
        )?))
    }
}

impl DisplayFields for Aggregate {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("")
            .field("group_by", &DisplayList(&self.group_by))
            .field("aggr", &DisplayList(&self.aggr))
            .finish()
    }
}

fn display_physical_agg(
    f: &mut Formatter,
    group_by: &[Expr],
    aggr: &[Expr],
    pushdown: bool,
) -> std::fmt::Result {
    let mut s = f.debug_struct("");
    s.field("group_by", &DisplayList(group_by));
    s.field("aggr", &DisplayList(aggr));
    if pushdown {
        s.field("pushdown", &true);
    }
    s.finish()
}

#[derive(Clone, Debug, PartialEq)]
pub struct HashAgg {
    group_by: Vec<Expr>,
    aggr: Vec<Expr>,
    /// Partial aggregation runs in the access layer.
    pushdown: bool,
}

impl HashAgg {
    pub fn new(agg: &Aggregate, pushdown: bool) -> Self {
        Self {
            group_by: agg.group_by.clone(),
            aggr: agg.aggr.clone(),
            pushdown,
        }
    }

    pub fn pushdown(&self) -> bool {
        self.pushdown
    }
}

impl DisplayFields for HashAgg {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        display_physical_agg(f, &self.group_by, &self.aggr, self.pushdown)
    }
}

/// Aggregation over input sorted by group by keys.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamAgg {
    group_by: Vec<Expr>,
    aggr: Vec<Expr>,
    pushdown: bool,
}

impl StreamAgg {
    pub fn new(agg: &Aggregate, pushdown: bool) -> Self {
        Self {
            group_by: agg.group_by.clone(),
            aggr: agg.aggr.clone(),
            pushdown,
        }
    }

    pub fn group_by(&self) -> &[Expr] {
        &self.group_by
    }

    pub fn pushdown(&self) -> bool {
        self.pushdown
    }
}

impl DisplayFields for StreamAgg {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        display_physical_agg(f, &self.group_by, &self.aggr, self.pushdown)
    }
}
