use std::collections::HashSet;

use anyhow::bail;
use datafusion_common::Column;
use datafusion_expr::expr::BinaryExpr;
use datafusion_expr::{Expr, JoinType, Operator as BinaryOperator};

use crate::error::QuartziteResult;
use crate::expr::{conjunction, expr_columns, split_conjunction};
use crate::operator::LogicalOperator::{LogicalFilter, LogicalJoin, LogicalScan};
use crate::operator::Operator::Logical;
use crate::operator::{Filter, Join, JoinKey};
use crate::optimizer::Optimizer;
use crate::properties::LogicalProperty;
use crate::rules::RuleId::{MergeFilterIntoScan, MergeFilters, PushFilterIntoJoin};
use crate::rules::RulePromise::Medium;
use crate::rules::{
    any, pattern, OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult,
};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref MERGE_FILTERS_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalFilter(_))))
          .leaf(|op| matches!(op, Logical(LogicalFilter(_))))
        .finish()
    };
    static ref MERGE_FILTER_INTO_SCAN_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalFilter(_))))
          .leaf(|op| matches!(op, Logical(LogicalScan(_))))
        .finish()
    };
    static ref PUSH_FILTER_INTO_JOIN_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalFilter(_))))
          .pattern(|op| matches!(op, Logical(LogicalJoin(_))))
            .leaf(any)
            .leaf(any)
          .finish()
        .finish()
    };
}

/// Merges two adjacent filters into one conjunction.
#[derive(Clone, Default)]
pub struct MergeFiltersRule {}

impl MergeFiltersRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for MergeFiltersRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let (Logical(LogicalFilter(upper)), Logical(LogicalFilter(lower))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let predicate = lower.predicate().clone().and(upper.predicate().clone());
            result.add(input[0].clone_with_inputs(Logical(LogicalFilter(Filter::new(predicate)))));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &MERGE_FILTERS_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        MergeFilters
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Moves filter conjuncts into the scan below, where they become candidates of range derivation.
///
/// A scan which already carries a pushed limit keeps the filter above, since the limit applies
/// before the filter.
#[derive(Clone, Default)]
pub struct MergeFilterIntoScanRule {}

impl MergeFilterIntoScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for MergeFilterIntoScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        if let (Logical(LogicalFilter(filter)), Logical(LogicalScan(scan))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            if scan.pushed().is_some() {
                return Ok(());
            }

            let new_scan = scan
                .clone()
                .with_filters(split_conjunction(filter.predicate()).into_iter().cloned());
            result.add(OptExpression::from(Logical(LogicalScan(new_scan))));
            Ok(())
        } else {
            bail!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &MERGE_FILTER_INTO_SCAN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        MergeFilterIntoScan
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Pushes filter conjuncts into join inputs.
///
/// A conjunct moves into an input when it only references that input's columns and the join
/// doesn't null-extend that input. Over an inner join, conjuncts spanning both inputs become join
/// keys (column equalities) or the join filter.
#[derive(Clone, Default)]
pub struct PushFilterIntoJoinRule {}

impl PushFilterIntoJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

fn references_only(columns: &HashSet<Column>, prop: &LogicalProperty) -> bool {
    columns.iter().all(|c| prop.contains_column(c))
}

/// `left = right` where each side is a column from a different join input.
fn as_join_key(expr: &Expr, left: &LogicalProperty, right: &LogicalProperty) -> Option<JoinKey> {
    match expr {
        Expr::BinaryExpr(BinaryExpr {
            left: l,
            op: BinaryOperator::Eq,
            right: r,
        }) => match (l.as_ref(), r.as_ref()) {
            (Expr::Column(a), Expr::Column(b)) => {
                if left.contains_column(a) && right.contains_column(b) {
                    Some((a.clone(), b.clone()))
                } else if left.contains_column(b) && right.contains_column(a) {
                    Some((b.clone(), a.clone()))
                } else {
                    None
                }
            }
            _ => None,
        },
        _ => None,
    }
}

fn wrap_with_filter<O: Optimizer>(input: &OptExpression<O>, conjuncts: Vec<Expr>) -> OptExpression<O> {
    match conjunction(conjuncts) {
        Some(predicate) => OptExpression::with_operator(
            Logical(LogicalFilter(Filter::new(predicate))),
            vec![input.clone()],
        ),
        None => input.clone(),
    }
}

impl Rule for PushFilterIntoJoinRule {
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

        let (push_left, push_right, inner) = match join.join_type() {
            JoinType::Inner => (true, true, true),
            JoinType::Left | JoinType::LeftSemi | JoinType::LeftAnti => (true, false, false),
            JoinType::Right | JoinType::RightSemi | JoinType::RightAnti => (false, true, false),
            JoinType::Full => return Ok(()),
        };

        let left_prop = input[0][0].get_logical_prop(ctx)?;
        let right_prop = input[0][1].get_logical_prop(ctx)?;

        let mut left_conjuncts = vec![];
        let mut right_conjuncts = vec![];
        let mut new_keys = vec![];
        let mut join_conjuncts = vec![];
        let mut remaining = vec![];

        for conjunct in split_conjunction(filter.predicate()) {
            let columns = expr_columns(conjunct)?;
            if columns.is_empty() {
                remaining.push(conjunct.clone());
            } else if push_left && references_only(&columns, left_prop) {
                left_conjuncts.push(conjunct.clone());
            } else if push_right && references_only(&columns, right_prop) {
                right_conjuncts.push(conjunct.clone());
            } else if inner {
                if let Some(key) = as_join_key(conjunct, left_prop, right_prop) {
                    new_keys.push(key);
                } else if columns
                    .iter()
                    .all(|c| left_prop.contains_column(c) || right_prop.contains_column(c))
                {
                    join_conjuncts.push(conjunct.clone());
                } else {
                    remaining.push(conjunct.clone());
                }
            } else {
                remaining.push(conjunct.clone());
            }
        }

        if left_conjuncts.is_empty()
            && right_conjuncts.is_empty()
            && new_keys.is_empty()
            && join_conjuncts.is_empty()
        {
            return Ok(());
        }

        let mut on = join.on().to_vec();
        on.extend(new_keys);
        let join_filter = conjunction(join.filter().cloned().into_iter().chain(join_conjuncts));
        let new_join = Join::new(join.join_type(), on, join.block())
            .with_filter(join_filter)
            .with_null_aware(join.null_aware());

        let new_join_expr = OptExpression::with_operator(
            Logical(LogicalJoin(new_join)),
            vec![
                wrap_with_filter(&input[0][0], left_conjuncts),
                wrap_with_filter(&input[0][1], right_conjuncts),
            ],
        );

        let ret = match conjunction(remaining) {
            Some(predicate) => OptExpression::with_operator(
                Logical(LogicalFilter(Filter::new(predicate))),
                vec![new_join_expr],
            ),
            None => new_join_expr,
        };
        result.add(ret);

        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &PUSH_FILTER_INTO_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        PushFilterIntoJoin
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}
