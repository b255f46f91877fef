use std::fmt::Formatter;

use crate::error::QuartziteResult;
use crate::operator::{input_at, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Union all of inputs. Output schema is the schema of first input.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct Union {}

impl Union {
    pub fn new() -> Self {
        Self {}
    }
}

impl OperatorTrait for Union {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        Ok(input_at(inputs, 0)?.clone())
    }
}

impl DisplayFields for Union {
    fn display(&self, _f: &mut Formatter) -> std::fmt::Result {
        Ok(())
    }
}
