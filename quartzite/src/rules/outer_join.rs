use std::collections::HashSet;

use anyhow::bail;
use datafusion_common::Column;
use datafusion_expr::JoinType;
use log::debug;

use crate::error::QuartziteResult;
use crate::expr::{is_null_rejecting, split_conjunction};
use crate::operator::LogicalOperator::{LogicalFilter, LogicalJoin};
use crate::operator::Operator::Logical;
use crate::optimizer::Optimizer;
use crate::rules::RuleId::SimplifyOuterJoin;
use crate::rules::RulePromise::High;
use crate::rules::{pattern, OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref SIMPLIFY_OUTER_JOIN_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalFilter(_))))
          .leaf(|op| matches!(op, Logical(LogicalJoin(_))))
        .finish()
    };
}

/// Converts outer joins to inner joins (or full joins to one sided outer joins) when the filter
/// above rejects the null-extended rows.
///
/// ```no
/// Filter(t2.a > 1)                       Filter(t2.a > 1)
///        |                                      |
/// Join(Left, t1.id = t2.id)   ---->      Join(Inner, t1.id = t2.id)
/// ```
#[derive(Clone, Default)]
pub struct SimplifyOuterJoinRule {}

impl SimplifyOuterJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for SimplifyOuterJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let (filter, join) = match (input.get_operator(ctx)?, input[0].get_operator(ctx)?) {
            (Logical(LogicalFilter(filter)), Logical(LogicalJoin(join))) => (filter, join),
            _ => bail!("Pattern miss matched"),
        };

        if !matches!(
            join.join_type(),
            JoinType::Left | JoinType::Right | JoinType::Full
        ) {
            return Ok(());
        }

        let conjuncts = split_conjunction(filter.predicate());
        let rejects_nulls_of = |side: usize| -> QuartziteResult<bool> {
            let columns: HashSet<Column> = input[0][side]
                .get_logical_prop(ctx)?
                .columns()
                .into_iter()
                .collect();
            Ok(conjuncts.iter().any(|c| is_null_rejecting(c, &columns)))
        };

        let new_join_type = match join.join_type() {
            JoinType::Left if rejects_nulls_of(1)? => JoinType::Inner,
            JoinType::Right if rejects_nulls_of(0)? => JoinType::Inner,
            JoinType::Full => match (rejects_nulls_of(0)?, rejects_nulls_of(1)?) {
                (true, true) => JoinType::Inner,
                (true, false) => JoinType::Left,
                (false, true) => JoinType::Right,
                (false, false) => JoinType::Full,
            },
            other => other,
        };

        if new_join_type == join.join_type() {
            return Ok(());
        }

        debug!(
            "Simplified {} join to {} join under filter {}",
            join.join_type(),
            new_join_type,
            filter.predicate()
        );
        let new_join = join.clone().with_join_type(new_join_type);
        result.add(OptExpression::with_operator(
            Logical(LogicalFilter(filter.clone())),
            vec![input[0].clone_with_inputs(Logical(LogicalJoin(new_join)))],
        ));

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SIMPLIFY_OUTER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        SimplifyOuterJoin
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}
