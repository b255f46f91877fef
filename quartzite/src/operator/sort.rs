use std::fmt::Formatter;

use crate::error::QuartziteResult;
use crate::operator::{input_at, DisplayFields, DisplayValue, Limit, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, OrderSpec};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    order: OrderSpec,
}

impl Sort {
    pub fn new(order: OrderSpec) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }
}

impl OperatorTrait for Sort {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        Ok(input_at(inputs, 0)?.clone())
    }
}

impl DisplayFields for Sort {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("")
            .field("order", &DisplayValue(&self.order))
            .finish()
    }
}

/// Sort followed by limit.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TopN {
    order: OrderSpec,
    limit: Limit,
}

impl TopN {
    pub fn new(order: OrderSpec, limit: Limit) -> Self {
        Self { order, limit }
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn limit(&self) -> &Limit {
        &self.limit
    }
}

impl OperatorTrait for TopN {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        Ok(input_at(inputs, 0)?.clone())
    }
}

impl DisplayFields for TopN {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("order", &DisplayValue(&self.order));
        if self.limit.offset() > 0 {
            s.field("offset", &self.limit.offset());
        }
        s.field("count", &self.limit.count()).finish()
    }
}
