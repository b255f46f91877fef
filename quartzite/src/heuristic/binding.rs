use crate::error::QuartziteResult;
use crate::heuristic::{HepNodeId, HepOptimizer};
use crate::optimizer::{OptExpr, Optimizer};
use crate::rules::{OptExpression, Pattern, PatternInputs};

/// Matches a [`Pattern`] against the plan graph, starting from one node.
pub(crate) struct Binding<'a, 'b> {
    expr_handle: HepNodeId,
    pattern: &'a Pattern,
    optimizer: &'b HepOptimizer,
}

impl<'a, 'b> Binding<'a, 'b> {
    pub(crate) fn new(
        expr_handle: HepNodeId,
        pattern: &'a Pattern,
        optimizer: &'b HepOptimizer,
    ) -> Self {
        Self {
            expr_handle,
            pattern,
            optimizer,
        }
    }

    pub(crate) fn next(self) -> QuartziteResult<Option<OptExpression<HepOptimizer>>> {
        let expr = self.optimizer.expr_at(self.expr_handle);
        if !(self.pattern.predict)(expr.operator()) {
            return Ok(None);
        }

        let inputs_len = expr.inputs_len(self.optimizer);
        let input_patterns: Vec<&Pattern> = match &self.pattern.inputs {
            PatternInputs::Any => {
                // Inputs of leaf node are bound as groups.
                let inputs = (0..inputs_len)
                    .map(|idx| {
                        expr.input_at(idx, self.optimizer)
                            .map(OptExpression::<HepOptimizer>::with_group_handle)
                    })
                    .collect::<QuartziteResult<Vec<OptExpression<HepOptimizer>>>>()?;
                return Ok(Some(OptExpression::with_expr_handle(self.expr_handle, inputs)));
            }
            PatternInputs::Exact(children) if children.len() == inputs_len => {
                children.iter().collect()
            }
            PatternInputs::Exact(_) => return Ok(None),
            PatternInputs::Each(child) => vec![child.as_ref(); inputs_len],
        };

        let mut inputs = Vec::with_capacity(inputs_len);
        for (idx, child_pattern) in input_patterns.into_iter().enumerate() {
            let input_handle = expr.input_at(idx, self.optimizer)?;
            match Binding::new(input_handle, child_pattern, self.optimizer).next()? {
                Some(opt_input) => inputs.push(opt_input),
                None => return Ok(None),
            }
        }

        Ok(Some(OptExpression::with_expr_handle(self.expr_handle, inputs)))
    }
}
