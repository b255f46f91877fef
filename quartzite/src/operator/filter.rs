use std::fmt::Formatter;

use datafusion_expr::Expr;

use crate::error::QuartziteResult;
use crate::operator::{input_at, DisplayFields, DisplayValue, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Filter rows by a predicate. As a physical operator it is a selection of residual rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }
}

impl OperatorTrait for Filter {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        Ok(input_at(inputs, 0)?.clone())
    }
}

impl DisplayFields for Filter {
    fn display(&self, fmt: &mut Formatter) -> std::fmt::Result {
        fmt.debug_struct("")
            .field("predicate", &DisplayValue(&self.predicate))
            .finish()
    }
}
