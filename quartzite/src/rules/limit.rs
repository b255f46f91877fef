use std::cmp::min;

use anyhow::bail;
use datafusion_common::Column;
use datafusion_expr::{Expr, JoinType};

use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::{
    LogicalJoin, LogicalLimit, LogicalProjection, LogicalScan, LogicalSort, LogicalTopN,
    LogicalUnion,
};
use crate::operator::Operator::Logical;
use crate::operator::{Limit, Operator, PushedLimit, TopN};
use crate::optimizer::Optimizer;
use crate::properties::{LogicalProperty, OrderSpec, Ordering};
use crate::rules::RuleId::{
    LimitSortToTopN, MergeLimit, PushLimitIntoUnion, PushLimitOverProjection,
    PushLimitThroughOuterJoin, PushLimitToScan,
};
use crate::rules::RulePromise::{Low, Medium};
use crate::rules::{
    any, pattern, OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult,
};

fn is_limit_or_top_n(op: &Operator) -> bool {
    matches!(op, Logical(LogicalLimit(_)) | Logical(LogicalTopN(_)))
}

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref MERGE_LIMIT_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalLimit(_))))
          .leaf(is_limit_or_top_n)
        .finish()
    };
    static ref LIMIT_SORT_TO_TOP_N_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalLimit(_))))
          .leaf(|op| matches!(op, Logical(LogicalSort(_))))
        .finish()
    };
    static ref PUSH_LIMIT_OVER_PROJECTION_PATTERN: Pattern = {
        pattern(is_limit_or_top_n)
          .leaf(|op| matches!(op, Logical(LogicalProjection(_))))
        .finish()
    };
    static ref PUSH_LIMIT_THROUGH_OUTER_JOIN_PATTERN: Pattern = {
        pattern(is_limit_or_top_n)
          .pattern(|op| matches!(op, Logical(LogicalJoin(_))))
            .leaf(any)
            .leaf(any)
          .finish()
        .finish()
    };
    static ref PUSH_LIMIT_INTO_UNION_PATTERN: Pattern = {
        pattern(is_limit_or_top_n)
          .pattern(|op| matches!(op, Logical(LogicalUnion(_))))
            .each(any)
          .finish()
        .finish()
    };
    static ref PUSH_LIMIT_TO_SCAN_PATTERN: Pattern = {
        pattern(is_limit_or_top_n)
          .leaf(|op| matches!(op, Logical(LogicalScan(_))))
        .finish()
    };
}

/// Rows a limit or top n operator needs from its input, as a limit without offset.
fn pushed_limit_of(op: &Operator) -> Option<PushedLimit> {
    match op {
        Logical(LogicalLimit(limit)) => Some(PushedLimit::new(OrderSpec::default(), limit.fetch())),
        Logical(LogicalTopN(top_n)) => Some(PushedLimit::new(
            top_n.order().clone(),
            top_n.limit().fetch(),
        )),
        _ => None,
    }
}

fn to_operator(pushed: PushedLimit) -> Operator {
    let limit = Limit::new(pushed.count());
    if pushed.order().is_empty() {
        Logical(LogicalLimit(limit))
    } else {
        Logical(LogicalTopN(TopN::new(pushed.order().clone(), limit)))
    }
}

/// Whether `op` already limits its output to what `pushed` keeps.
fn is_covered(op: &Operator, pushed: &PushedLimit) -> bool {
    pushed_limit_of(op)
        .map(|existing| existing.covers(pushed))
        .unwrap_or(false)
}

/// Puts `pushed` on top of `input`, below any projections heading it.
///
/// Returns `None` when the rows are limited already, when a top n orders by a column a
/// projection computes, or when the projection input is not bound.
fn limit_input<O: Optimizer>(
    input: &OptExpression<O>,
    pushed: PushedLimit,
    ctx: &O,
) -> QuartziteResult<Option<OptExpression<O>>> {
    let op = input.get_operator(ctx)?;
    if let Logical(LogicalProjection(projection)) = op {
        let projected = match input.inputs().first() {
            Some(projected) => projected,
            None => return Ok(None),
        };
        let output = input.get_logical_prop(ctx)?;
        let orders = pushed
            .order()
            .orders()
            .iter()
            .map(|o| {
                forwarded_column(o.column(), projection.expr(), output).map(|c| o.with_column(c))
            })
            .collect::<Option<Vec<Ordering>>>();
        let below = match orders {
            Some(orders) => PushedLimit::new(OrderSpec::new(orders), pushed.count()),
            None => return Ok(None),
        };
        return Ok(limit_input(projected, below, ctx)?
            .map(|limited| OptExpression::with_operator(op.clone(), vec![limited])));
    }

    if is_covered(op, &pushed) {
        return Ok(None);
    }
    Ok(Some(OptExpression::with_operator(
        to_operator(pushed),
        vec![input.clone()],
    )))
}

/// Merges a limit with the limit or top n below it.
///
/// Upper limit `(o1, c1)` over lower limit `(o2, c2)` reads `c2 - o1` rows of lower one
/// after skipping `o1`.
#[derive(Clone, Default)]
pub struct MergeLimitRule {}

impl MergeLimitRule {
    pub fn new() -> Self {
        Self {}
    }
}

fn merge_limits(upper: &Limit, lower: &Limit) -> Limit {
    Limit::with_offset(
        lower.offset().saturating_add(upper.offset()),
        min(upper.count(), lower.count().saturating_sub(upper.offset())),
    )
}

impl Rule for MergeLimitRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let new_op = match (input.get_operator(ctx)?, input[0].get_operator(ctx)?) {
            (Logical(LogicalLimit(upper)), Logical(LogicalLimit(lower))) => {
                Logical(LogicalLimit(merge_limits(upper, lower)))
            }
            (Logical(LogicalLimit(upper)), Logical(LogicalTopN(lower))) => Logical(LogicalTopN(
                TopN::new(lower.order().clone(), merge_limits(upper, lower.limit())),
            )),
            _ => bail!("Pattern miss matched"),
        };

        result.add(input[0].clone_with_inputs(new_op));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &MERGE_LIMIT_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        MergeLimit
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

#[derive(Clone, Default)]
pub struct LimitSortToTopNRule {}

impl LimitSortToTopNRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for LimitSortToTopNRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let (Logical(LogicalLimit(limit)), Logical(LogicalSort(sort))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let top_n = TopN::new(sort.order().clone(), limit.clone());
            result.add(input[0].clone_with_inputs(Logical(LogicalTopN(top_n))));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &LIMIT_SORT_TO_TOP_N_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        LimitSortToTopN
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

#[derive(Clone, Default)]
pub struct PushLimitOverProjectionRule {}

impl PushLimitOverProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

/// Maps output column of projection to the input column it forwards, if any.
fn forwarded_column(
    column: &Column,
    exprs: &[Expr],
    output: &LogicalProperty,
) -> Option<Column> {
    let idx = output.schema().index_of_column(column).ok()?;
    match exprs.get(idx)?.clone().unalias() {
        Expr::Column(c) => Some(c),
        _ => None,
    }
}

impl Rule for PushLimitOverProjectionRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let projection = match input[0].get_operator(ctx)? {
            Logical(LogicalProjection(projection)) => projection,
            _ => bail!("Pattern miss matched"),
        };

        let new_limit = match input.get_operator(ctx)? {
            Logical(LogicalLimit(limit)) => Logical(LogicalLimit(limit.clone())),
            Logical(LogicalTopN(top_n)) => {
                let output = input[0].get_logical_prop(ctx)?;
                let mut orders = Vec::with_capacity(top_n.order().orders().len());
                for ordering in top_n.order().orders() {
                    match forwarded_column(ordering.column(), projection.expr(), output) {
                        Some(c) => orders.push(ordering.with_column(c)),
                        None => return Ok(()),
                    }
                }
                Logical(LogicalTopN(TopN::new(
                    OrderSpec::new(orders),
                    top_n.limit().clone(),
                )))
            }
            _ => bail!("Pattern miss matched"),
        };

        let new_limit_expr = input[0].clone_with_inputs(new_limit);
        result.add(OptExpression::with_operator(
            Logical(LogicalProjection(projection.clone())),
            vec![new_limit_expr],
        ));

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_LIMIT_OVER_PROJECTION_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushLimitOverProjection
    }

    fn rule_promise(&self) -> RulePromise {
        Low
    }
}

/// Copies a limit into the preserved side of a left or right outer join.
///
/// Every preserved row produces at least one joined row, so the first `offset + count` rows of the
/// preserved input are enough. A top n is copied only when it orders by preserved columns.
#[derive(Clone, Default)]
pub struct PushLimitThroughOuterJoinRule {}

impl PushLimitThroughOuterJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushLimitThroughOuterJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let limit_op = input.get_operator(ctx)?;
        let join_op = input[0].get_operator(ctx)?;
        let (pushed, join) = match (pushed_limit_of(limit_op), join_op) {
            (Some(pushed), Logical(LogicalJoin(join))) => (pushed, join),
            _ => bail!("Pattern miss matched"),
        };

        let preserved = match join.join_type() {
            JoinType::Left => 0,
            JoinType::Right => 1,
            _ => return Ok(()),
        };

        let preserved_prop = input[0][preserved].get_logical_prop(ctx)?;
        if !pushed.order().columns().all(|c| preserved_prop.contains_column(c)) {
            return Ok(());
        }

        let limited = match limit_input(&input[0][preserved], pushed, ctx)? {
            Some(limited) => limited,
            None => return Ok(()),
        };

        let mut new_inputs = input[0].inputs().to_vec();
        new_inputs[preserved] = limited;

        let new_join = OptExpression::with_operator(join_op.clone(), new_inputs);
        result.add(OptExpression::with_operator(limit_op.clone(), vec![new_join]));

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_LIMIT_THROUGH_OUTER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushLimitThroughOuterJoin
    }

    fn rule_promise(&self) -> RulePromise {
        Low
    }
}

/// Copies a limit into each input of a union all.
///
/// Inputs already limited to the pushed rows are left alone.
#[derive(Clone, Default)]
pub struct PushLimitIntoUnionRule {}

impl PushLimitIntoUnionRule {
    pub fn new() -> Self {
        Self {}
    }
}

/// Rewrites `order` in terms of columns of a union input, by position.
fn order_for_union_input(
    order: &OrderSpec,
    union_output: &LogicalProperty,
    input: &LogicalProperty,
) -> Option<OrderSpec> {
    let input_columns = input.columns();
    let orders = order
        .orders()
        .iter()
        .map(|o| {
            let idx = union_output.schema().index_of_column(o.column()).ok()?;
            input_columns.get(idx).map(|c| o.with_column(c.clone()))
        })
        .collect::<Option<Vec<Ordering>>>()?;
    Some(OrderSpec::new(orders))
}

impl Rule for PushLimitIntoUnionRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let limit_op = input.get_operator(ctx)?;
        let pushed = match pushed_limit_of(limit_op) {
            Some(pushed) => pushed,
            None => bail!("Pattern miss matched"),
        };
        let union_output = input[0].get_logical_prop(ctx)?;

        let mut changed = false;
        let mut new_inputs = Vec::with_capacity(input[0].inputs().len());
        for child in input[0].inputs() {
            let order = order_for_union_input(
                pushed.order(),
                union_output,
                child.get_logical_prop(ctx)?,
            );
            let limited = match order {
                Some(order) => limit_input(child, PushedLimit::new(order, pushed.count()), ctx)?,
                None => None,
            };
            match limited {
                Some(limited) => {
                    changed = true;
                    new_inputs.push(limited);
                }
                None => new_inputs.push(child.clone()),
            }
        }

        if changed {
            let new_union = OptExpression::with_operator(input[0].get_operator(ctx)?.clone(), new_inputs);
            result.add(OptExpression::with_operator(limit_op.clone(), vec![new_union]));
        }

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_LIMIT_INTO_UNION_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushLimitIntoUnion
    }

    fn rule_promise(&self) -> RulePromise {
        Low
    }
}

/// Records a limit or top n in the scan below, the original operator stays on top.
#[derive(Clone, Default)]
pub struct PushLimitToScanRule {}

impl PushLimitToScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushLimitToScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let limit_op = input.get_operator(ctx)?;
        if let (Some(pushed), Logical(LogicalScan(scan))) =
            (pushed_limit_of(limit_op), input[0].get_operator(ctx)?)
        {
            if scan.pushed().map(|p| p.covers(&pushed)).unwrap_or(false) {
                return Ok(());
            }

            let new_scan = OptExpression::from(Logical(LogicalScan(scan.clone().with_pushed(pushed))));
            result.add(OptExpression::with_operator(limit_op.clone(), vec![new_scan]));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_LIMIT_TO_SCAN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushLimitToScan
    }

    fn rule_promise(&self) -> RulePromise {
        Low
    }
}

#[cfg(test)]
mod tests {
    use datafusion_expr::{col, JoinType};

    use crate::heuristic::HepOptimizer;
    use crate::operator::LogicalOperator::{LogicalLimit, LogicalProjection, LogicalScan, LogicalTopN};
    use crate::operator::Operator::Logical;
    use crate::operator::{Limit, Projection, PushedLimit, Scan, TopN};
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::{OrderSpec, Ordering};
    use crate::rules::{
        LimitSortToTopNRule, MergeLimitRule, OptExpression, PushLimitIntoUnionRule,
        PushLimitOverProjectionRule, PushLimitThroughOuterJoinRule, PushLimitToScanRule, Rule,
    };
    use crate::test_utils::{
        apply_rule_at_root, build_hep_optimizer_for_test, column, rewrite_to_string,
    };

    #[test]
    fn test_push_limit_over_projection_pattern() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .limit(5)
            .projection(vec![col("t1.a")])
            .limit(10)
            .build()
            .unwrap();

        let rule = PushLimitOverProjectionRule::new();
        assert!((rule.pattern().predict)(original_plan.root().operator()));
    }

    #[test]
    fn test_merge_limit() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .limit_with_offset(2, 10)
            .limit_with_offset(3, 5)
            .build()
            .unwrap();

        // Rows 5..10 of the scan.
        let explain = rewrite_to_string(original_plan, vec![MergeLimitRule::new().into()]);
        let expected = r#"LogicalLimit { offset: 5, count: 5 }
└─ LogicalScan { table_name: "t1" }
"#;
        assert_eq!(expected, explain);
    }

    #[test]
    fn test_merge_limit_past_lower_count() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .limit(3)
            .limit_with_offset(5, 10)
            .build()
            .unwrap();

        let optimizer = build_hep_optimizer_for_test(original_plan);
        let results = apply_rule_at_root(&MergeLimitRule::new(), &optimizer);

        assert_eq!(
            &Logical(LogicalLimit(Limit::with_offset(5, 0))),
            results[0].get_operator(&optimizer).unwrap()
        );
    }

    #[test]
    fn test_limit_sort_to_top_n() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .sort(vec![Ordering::desc(column("t1.a"))])
            .limit(10)
            .build()
            .unwrap();

        let optimizer = build_hep_optimizer_for_test(original_plan);
        let results = apply_rule_at_root(&LimitSortToTopNRule::new(), &optimizer);

        let expected = TopN::new(
            OrderSpec::new(vec![Ordering::desc(column("t1.a"))]),
            Limit::new(10),
        );
        assert_eq!(
            &Logical(LogicalTopN(expected)),
            results[0].get_operator(&optimizer).unwrap()
        );
    }

    #[test]
    fn test_push_limit_over_projection() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .projection(vec![col("t1.a")])
            .limit(10)
            .build()
            .unwrap();

        let optimizer = build_hep_optimizer_for_test(original_plan);
        let results = apply_rule_at_root(&PushLimitOverProjectionRule::new(), &optimizer);

        let expected = OptExpression::<HepOptimizer>::with_operator(
            Logical(LogicalProjection(Projection::new(vec![col("t1.a")]))),
            vec![OptExpression::with_operator(
                Logical(LogicalLimit(Limit::new(10))),
                vec![results[0][0][0].clone()],
            )],
        );
        assert_eq!(vec![expected], results);
    }

    #[test]
    fn test_push_top_n_over_alias() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .projection(vec![col("t1.a").alias("x"), col("t1.a") + col("t1.b")])
            .top_n(vec![Ordering::asc(column("x"))], 3)
            .build()
            .unwrap();

        let optimizer = build_hep_optimizer_for_test(original_plan);
        let results = apply_rule_at_root(&PushLimitOverProjectionRule::new(), &optimizer);

        let expected = TopN::new(
            OrderSpec::new(vec![Ordering::asc(column("t1.a"))]),
            Limit::new(3),
        );
        assert_eq!(
            &Logical(LogicalTopN(expected)),
            results[0][0].get_operator(&optimizer).unwrap()
        );
    }

    #[test]
    fn test_top_n_over_computed_column_not_pushed() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .projection(vec![(col("t1.a") + col("t1.b")).alias("s")])
            .top_n(vec![Ordering::asc(column("s"))], 3)
            .build()
            .unwrap();

        let optimizer = build_hep_optimizer_for_test(original_plan);
        assert!(apply_rule_at_root(&PushLimitOverProjectionRule::new(), &optimizer).is_empty());
    }

    #[test]
    fn test_push_limit_to_scan() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .limit_with_offset(5, 10)
            .build()
            .unwrap();

        let optimizer = build_hep_optimizer_for_test(original_plan);
        let results = apply_rule_at_root(&PushLimitToScanRule::new(), &optimizer);

        let expected = OptExpression::<HepOptimizer>::with_operator(
            Logical(LogicalLimit(Limit::with_offset(5, 10))),
            vec![OptExpression::from(Logical(LogicalScan(
                Scan::new("t1", 1).with_pushed(PushedLimit::new(OrderSpec::default(), 15)),
            )))],
        );

        assert_eq!(vec![expected], results);
    }

    #[test]
    fn test_push_limit_to_scan_reaches_fixed_point() {
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .sort(vec![Ordering::desc(column("t1.a"))])
            .limit(1)
            .build()
            .unwrap();

        let explain = rewrite_to_string(
            original_plan,
            vec![
                LimitSortToTopNRule::new().into(),
                PushLimitToScanRule::new().into(),
            ],
        );
        let expected = r#"LogicalTopN { order: [t1.a DESC], count: 1 }
└─ LogicalScan { table_name: "t1", pushed: top 1 by [t1.a DESC] }
"#;
        assert_eq!(expected, explain);
    }

    #[test]
    fn test_push_limit_through_left_join() {
        let right = LogicalPlanBuilder::new().scan("t2", 1).build().unwrap();
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .join(JoinType::Left, vec![(column("t1.a"), column("t2.a"))], right)
            .limit(10)
            .build()
            .unwrap();

        let explain = rewrite_to_string(
            original_plan,
            vec![PushLimitThroughOuterJoinRule::new().into()],
        );
        let expected = r#"LogicalLimit { count: 10 }
└─ LogicalJoin { join_type: Left, on: [t1.a = t2.a] }
   ├─ LogicalLimit { count: 10 }
   │  └─ LogicalScan { table_name: "t1" }
   └─ LogicalScan { table_name: "t2" }
"#;
        assert_eq!(expected, explain);
    }

    #[test]
    fn test_top_n_on_null_extended_side_not_pushed() {
        let right = LogicalPlanBuilder::new().scan("t2", 1).build().unwrap();
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .join(JoinType::Left, vec![(column("t1.a"), column("t2.a"))], right)
            .top_n(vec![Ordering::asc(column("t2.b"))], 10)
            .build()
            .unwrap();

        let optimizer = build_hep_optimizer_for_test(original_plan);
        assert!(apply_rule_at_root(&PushLimitThroughOuterJoinRule::new(), &optimizer).is_empty());
    }

    #[test]
    fn test_push_top_n_into_union() {
        let other = LogicalPlanBuilder::new().scan("t2", 1).build().unwrap();
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .union(vec![other])
            .top_n(vec![Ordering::asc(column("t1.b"))], 4)
            .build()
            .unwrap();

        let explain = rewrite_to_string(original_plan, vec![PushLimitIntoUnionRule::new().into()]);
        let expected = r#"LogicalTopN { order: [t1.b], count: 4 }
└─ LogicalUnion
   ├─ LogicalTopN { order: [t1.b], count: 4 }
   │  └─ LogicalScan { table_name: "t1" }
   └─ LogicalTopN { order: [t2.b], count: 4 }
      └─ LogicalScan { table_name: "t2" }
"#;
        assert_eq!(expected, explain);
    }

    #[test]
    fn test_push_limit_through_left_join_below_projection() {
        let right = LogicalPlanBuilder::new().scan("t2", 1).build().unwrap();
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .projection(vec![col("t1.a").alias("x"), col("t1.b")])
            .join(JoinType::Left, vec![(column("t1.b"), column("t2.a"))], right)
            .top_n(vec![Ordering::asc(column("x"))], 10)
            .build()
            .unwrap();

        let explain = rewrite_to_string(
            original_plan,
            vec![PushLimitThroughOuterJoinRule::new().into()],
        );
        let expected = r#"LogicalTopN { order: [x], count: 10 }
└─ LogicalJoin { join_type: Left, on: [t1.b = t2.a] }
   ├─ LogicalProjection { expr: [t1.a AS x, t1.b] }
   │  └─ LogicalTopN { order: [t1.a], count: 10 }
   │     └─ LogicalScan { table_name: "t1" }
   └─ LogicalScan { table_name: "t2" }
"#;
        assert_eq!(expected, explain);
    }

    #[test]
    fn test_push_limit_into_union_below_projection() {
        let other = LogicalPlanBuilder::new()
            .scan("t2", 1)
            .projection(vec![col("t2.a"), col("t2.b")])
            .build()
            .unwrap();
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .projection(vec![col("t1.a"), col("t1.b")])
            .union(vec![other])
            .limit(4)
            .build()
            .unwrap();

        let explain = rewrite_to_string(original_plan, vec![PushLimitIntoUnionRule::new().into()]);
        let expected = r#"LogicalLimit { count: 4 }
└─ LogicalUnion
   ├─ LogicalProjection { expr: [t1.a, t1.b] }
   │  └─ LogicalLimit { count: 4 }
   │     └─ LogicalScan { table_name: "t1" }
   └─ LogicalProjection { expr: [t2.a, t2.b] }
      └─ LogicalLimit { count: 4 }
         └─ LogicalScan { table_name: "t2" }
"#;
        assert_eq!(expected, explain);
    }

    #[test]
    fn test_top_n_on_computed_union_column_not_pushed() {
        let other = LogicalPlanBuilder::new()
            .scan("t2", 1)
            .projection(vec![(col("t2.a") + col("t2.b")).alias("s")])
            .build()
            .unwrap();
        let original_plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .projection(vec![col("t1.a").alias("s")])
            .union(vec![other])
            .top_n(vec![Ordering::asc(column("s"))], 4)
            .build()
            .unwrap();

        let explain = rewrite_to_string(original_plan, vec![PushLimitIntoUnionRule::new().into()]);
        let expected = r#"LogicalTopN { order: [s], count: 4 }
└─ LogicalUnion
   ├─ LogicalProjection { expr: [t1.a AS s] }
   │  └─ LogicalTopN { order: [t1.a], count: 4 }
   │     └─ LogicalScan { table_name: "t1" }
   └─ LogicalProjection { expr: [t2.a + t2.b AS s] }
      └─ LogicalScan { table_name: "t2" }
"#;
        assert_eq!(expected, explain);
    }
}
