use std::fmt::Formatter;

use datafusion_common::DFSchemaRef;

use crate::error::QuartziteResult;
use crate::operator::{DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Relation known to produce no row.
#[derive(Clone, Debug, PartialEq)]
pub struct Dual {
    schema: DFSchemaRef,
}

impl Dual {
    pub fn new(schema: DFSchemaRef) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &DFSchemaRef {
        &self.schema
    }
}

impl OperatorTrait for Dual {
    fn derive_logical_prop(
        &self,
        _inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        Ok(LogicalProperty::new(self.schema.as_ref().clone()))
    }
}

impl DisplayFields for Dual {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("").field("rows", &0).finish()
    }
}
