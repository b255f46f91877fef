use datafusion_common::{DFField, DFSchema};
use datafusion_expr::{Expr, ExprSchemable};
use std::fmt::Formatter;

use crate::error::{DFResult, QuartziteResult};
use crate::operator::{input_at, DisplayFields, DisplayList, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    expr: Vec<Expr>,
}

impl Projection {
    pub fn new<I: IntoIterator<Item = Expr>>(exprs: I) -> Self {
        Self {
            expr: exprs.into_iter().collect(),
        }
    }

    pub fn expr(&self) -> &[Expr] {
        &self.expr
    }
}

impl OperatorTrait for Projection {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        let input_schema = input_at(inputs, 0)?.schema();
        let schema = DFSchema::new_with_metadata(
            self.expr
                .iter()
                .map(|e| e.to_field(input_schema))
                .collect::<DFResult<Vec<DFField>>>()?,
            input_schema.metadata().clone(),
        )?;

        Ok(LogicalProperty::new(schema))
    }
}

impl DisplayFields for Projection {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("").field("expr", &DisplayList(&self.expr)).finish()
    }
}
