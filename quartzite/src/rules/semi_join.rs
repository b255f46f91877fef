use anyhow::bail;
use datafusion_expr::{Expr, JoinType};

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::{LogicalAggregate, LogicalJoin, LogicalProjection};
use crate::operator::Operator::Logical;
use crate::operator::{Aggregate, Join, Projection};
use crate::optimizer::Optimizer;
use crate::rules::RuleId::SemiJoinToInnerJoin;
use crate::rules::RulePromise::High;
use crate::rules::{any, pattern, OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref SEMI_JOIN_TO_INNER_JOIN_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalJoin(_))))
          .leaf(any)
          .leaf(any)
        .finish()
    };
}

/// Rewrites a left semi join into an inner join against the distinct join keys of right side.
///
/// ```no
/// LeftSemiJoin(t1.a = t2.b)                 Projection(t1.*)
///     /         \                                 |
///   t1          t2          ---->         InnerJoin(t1.a = t2.b)
///                                            /          \
///                                          t1     Aggregate(group by t2.b)
///                                                        |
///                                                       t2
/// ```
///
/// Only equality keys without other conditions qualify. A null aware join is kept, since a NULL
/// key there makes the predicate unknown rather than false.
#[derive(Clone, Default)]
pub struct SemiJoinToInnerJoinRule {}

impl SemiJoinToInnerJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for SemiJoinToInnerJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let join = match input.get_operator(ctx)? {
            Logical(LogicalJoin(join)) => join,
            _ => bail!("Pattern miss matched"),
        };

        if join.join_type() != JoinType::LeftSemi
            || join.on().is_empty()
            || join.null_aware()
            || join.filter().is_some()
        {
            return Ok(());
        }

        let group_by: Vec<Expr> = join
            .on()
            .iter()
            .map(|(_, right)| Expr::Column(right.clone()))
            .collect();
        let distinct_keys = OptExpression::with_operator(
            Logical(LogicalAggregate(Aggregate::new(group_by, vec![], join.block()))),
            vec![input[1].clone()],
        );

        let inner_join = Join::new(JoinType::Inner, join.on().to_vec(), join.block());
        let new_join = OptExpression::with_operator(
            Logical(LogicalJoin(inner_join)),
            vec![input[0].clone(), distinct_keys],
        );

        let left_columns = input[0]
            .get_logical_prop(ctx)?
            .columns()
            .into_iter()
            .map(Expr::Column);
        result.add(OptExpression::with_operator(
            Logical(LogicalProjection(Projection::new(left_columns))),
            vec![new_join],
        ));

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SEMI_JOIN_TO_INNER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        SemiJoinToInnerJoin
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}

#[cfg(test)]
mod tests {
    use datafusion_expr::{col, lit, JoinType};

    use crate::operator::Join;
    use crate::plan::{LogicalPlanBuilder, Plan};
    use crate::rules::SemiJoinToInnerJoinRule;
    use crate::test_utils::{
        apply_rule_at_root, build_hep_optimizer_for_test, column, rewrite_to_string,
    };

    fn semi_join(join: Join) -> Plan {
        let right = LogicalPlanBuilder::new().scan("t2", 2).build().unwrap();
        LogicalPlanBuilder::new()
            .scan("t1", 1)
            .join_node(join, right)
            .build()
            .unwrap()
    }

    #[test]
    fn test_semi_join_to_inner_join() {
        let plan = semi_join(Join::new(
            JoinType::LeftSemi,
            vec![(column("t1.a"), column("t2.b"))],
            1,
        ));

        let expected = r#"LogicalProjection { expr: [t1.id, t1.a, t1.b, t1.c] }
└─ LogicalJoin { join_type: Inner, on: [t1.a = t2.b] }
   ├─ LogicalScan { table_name: "t1" }
   └─ LogicalAggregate { group_by: [t2.b], aggr: [] }
      └─ LogicalScan { table_name: "t2" }
"#;
        assert_eq!(
            expected,
            rewrite_to_string(plan, vec![SemiJoinToInnerJoinRule::new().into()])
        );
    }

    #[test]
    fn test_null_aware_semi_join_kept() {
        let plan = semi_join(
            Join::new(
                JoinType::LeftSemi,
                vec![(column("t1.a"), column("t2.b"))],
                1,
            )
            .with_null_aware(true),
        );
        let optimizer = build_hep_optimizer_for_test(plan);
        assert!(apply_rule_at_root(&SemiJoinToInnerJoinRule::new(), &optimizer).is_empty());
    }

    #[test]
    fn test_semi_join_with_other_condition_kept() {
        let plan = semi_join(
            Join::new(
                JoinType::LeftSemi,
                vec![(column("t1.a"), column("t2.b"))],
                1,
            )
            .with_filter(Some(col("t2.c").eq(lit("x")))),
        );
        let optimizer = build_hep_optimizer_for_test(plan);
        assert!(apply_rule_at_root(&SemiJoinToInnerJoinRule::new(), &optimizer).is_empty());

        let plan = semi_join(Join::new(JoinType::LeftAnti, vec![(column("t1.a"), column("t2.b"))], 1));
        let optimizer = build_hep_optimizer_for_test(plan);
        assert!(apply_rule_at_root(&SemiJoinToInnerJoinRule::new(), &optimizer).is_empty());
    }
}
