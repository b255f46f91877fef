use std::fmt::Formatter;

use crate::error::QuartziteResult;
use crate::operator::{input_at, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Limit {
    offset: usize,
    count: usize,
}

impl Limit {
    pub fn new(count: usize) -> Self {
        Self { offset: 0, count }
    }

    pub fn with_offset(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of input rows needed to produce the output.
    pub fn fetch(&self) -> usize {
        self.offset.saturating_add(self.count)
    }
}

impl OperatorTrait for Limit {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        Ok(input_at(inputs, 0)?.clone())
    }
}

impl DisplayFields for Limit {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        if self.offset > 0 {
            s.field("offset", &self.offset);
        }
        s.field("count", &self.count).finish()
    }
}
