use anyhow::bail;
use datafusion_common::Column;
use datafusion_expr::expr::AggregateFunction;
use datafusion_expr::{AggregateFunction as AggregateKind, Expr, JoinType};
use log::debug;

use crate::catalog::{IndexColumn, TableMeta};
use crate::config::OptimizerConfig;
use crate::error::QuartziteResult;
use crate::operator::LogicalOperator::{
    LogicalAggregate, LogicalJoin, LogicalLimit, LogicalScan, LogicalSort,
};
use crate::operator::Operator::Logical;
use crate::operator::{Aggregate, Join, Limit, Scan, Sort};
use crate::optimizer::Optimizer;
use crate::physical::index_range_columns;
use crate::properties::{OrderSpec, Ordering};
use crate::range::RangeBuilder;
use crate::rules::RuleId::MinMaxElimination;
use crate::rules::RulePromise::High;
use crate::rules::{pattern, OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref MIN_MAX_ELIMINATION_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalAggregate(_))))
          .leaf(|op| matches!(op, Logical(LogicalScan(_))))
        .finish()
    };
}

/// Rewrites `MIN(x)`/`MAX(x)` without group by into reading one row in index order.
///
/// ```no
///  Aggregate(MAX(t.a))              Aggregate(MAX(t.a))
///        |                                  |
///     Scan(t)          ---->             Limit(1)
///                                           |
///                                     Sort(t.a DESC)
///                                           |
///                                Scan(t, t.a IS NOT NULL)
/// ```
///
/// Several targets become a cross join of single row branches, one per aggregate. The scan
/// filters must be fully expressible as ranges of the index used, otherwise reading in index
/// order could still touch every row.
#[derive(Clone, Default)]
pub struct MinMaxEliminationRule {}

impl MinMaxEliminationRule {
    pub fn new() -> Self {
        Self {}
    }
}

/// `(is_min, column)` of a min or max aggregate over a plain column.
fn min_max_target(expr: &Expr) -> Option<(bool, Column)> {
    match expr.clone().unalias() {
        Expr::AggregateFunction(AggregateFunction {
            fun, args, filter, ..
        }) if filter.is_none() && args.len() == 1 => match (fun, &args[0]) {
            (AggregateKind::Min, Expr::Column(c)) => Some((true, c.clone())),
            (AggregateKind::Max, Expr::Column(c)) => Some((false, c.clone())),
            _ => None,
        },
        _ => None,
    }
}

/// Whether some index or the handle starts with `column`, and `scan` filters translate to ranges
/// on it without residual.
fn has_ordered_access(
    table: &TableMeta,
    scan: &Scan,
    column: &str,
    config: &OptimizerConfig,
) -> bool {
    let mut candidates: Vec<Vec<IndexColumn>> = table
        .indexes()
        .iter()
        .filter(|index| {
            index
                .columns
                .first()
                .map(|c| c.name == column && c.prefix_len.is_none())
                .unwrap_or(false)
        })
        .map(|index| index.columns.clone())
        .collect();
    if table.handle() == Some(column) {
        candidates.push(vec![IndexColumn::new(column)]);
    }

    let builder = RangeBuilder::new(config);
    candidates.iter().any(|columns| {
        let range_columns = index_range_columns(table, scan, columns);
        builder
            .build(scan.filters(), &range_columns)
            .residual_conditions
            .is_empty()
    })
}

impl Rule for MinMaxEliminationRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()> {
        let (agg, scan) = match (input.get_operator(ctx)?, input[0].get_operator(ctx)?) {
            (Logical(LogicalAggregate(agg)), Logical(LogicalScan(scan))) => (agg, scan),
            _ => bail!("Pattern miss matched"),
        };

        if !agg.group_by().is_empty() || agg.aggr().is_empty() || scan.pushed().is_some() {
            return Ok(());
        }

        let table = match ctx.context().catalog.table(scan.table_name()) {
            Some(table) => table,
            None => return Ok(()),
        };

        let mut targets = Vec::with_capacity(agg.aggr().len());
        for expr in agg.aggr() {
            match min_max_target(expr) {
                Some((is_min, column))
                    if has_ordered_access(&table, scan, &column.name, &ctx.context().config) =>
                {
                    targets.push((expr.clone(), is_min, column))
                }
                _ => return Ok(()),
            }
        }

        let mut branches = targets.into_iter().map(|(expr, is_min, column)| {
            let mut new_scan = scan.clone();
            if table.is_nullable(&column.name) {
                new_scan = new_scan.with_filters(vec![Expr::Column(column.clone()).is_not_null()]);
            }
            let sort = Sort::new(OrderSpec::new(vec![Ordering::new(column, is_min)]));
            let single_agg = Aggregate::new(vec![], vec![expr], agg.block());

            OptExpression::with_operator(
                Logical(LogicalAggregate(single_agg)),
                vec![OptExpression::with_operator(
                    Logical(LogicalLimit(Limit::new(1))),
                    vec![OptExpression::with_operator(
                        Logical(LogicalSort(sort)),
                        vec![OptExpression::from(Logical(LogicalScan(new_scan)))],
                    )],
                )],
            )
        });

        let first = match branches.next() {
            Some(first) => first,
            None => return Ok(()),
        };
        let ret = branches.fold(first, |left, right| {
            OptExpression::with_operator(
                Logical(LogicalJoin(Join::new(JoinType::Inner, vec![], agg.block()))),
                vec![left, right],
            )
        });

        debug!("Eliminated {} min/max aggregates over {}", agg.aggr().len(), scan.table_name());
        result.add(ret);
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &MIN_MAX_ELIMINATION_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        MinMaxElimination
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}

#[cfg(test)]
mod tests {
    use datafusion_expr::{col, count, lit, max, min};

    use crate::operator::Scan;
    use crate::plan::{LogicalPlanBuilder, Plan};
    use crate::rules::MinMaxEliminationRule;
    use crate::test_utils::{apply_rule_at_root, build_hep_optimizer_for_test, rewrite_to_string};

    fn is_rewritten(plan: Plan) -> bool {
        let optimizer = build_hep_optimizer_for_test(plan);
        !apply_rule_at_root(&MinMaxEliminationRule::new(), &optimizer).is_empty()
    }

    #[test]
    fn test_max_to_limit() {
        let plan = LogicalPlanBuilder::new()
            .scan("t", 1)
            .aggregate(vec![], vec![max(col("t.a"))])
            .build()
            .unwrap();

        let expected = r#"LogicalAggregate { group_by: [], aggr: [MAX(t.a)] }
└─ LogicalLimit { count: 1 }
   └─ LogicalSort { order: [t.a DESC] }
      └─ LogicalScan { table_name: "t", filters: [t.a IS NOT NULL] }
"#;
        assert_eq!(
            expected,
            rewrite_to_string(plan, vec![MinMaxEliminationRule::new().into()])
        );
    }

    #[test]
    fn test_min_of_handle_has_no_null_filter() {
        let plan = LogicalPlanBuilder::new()
            .scan("t", 1)
            .aggregate(vec![], vec![min(col("t.id"))])
            .build()
            .unwrap();

        let expected = r#"LogicalAggregate { group_by: [], aggr: [MIN(t.id)] }
└─ LogicalLimit { count: 1 }
   └─ LogicalSort { order: [t.id] }
      └─ LogicalScan { table_name: "t" }
"#;
        assert_eq!(
            expected,
            rewrite_to_string(plan, vec![MinMaxEliminationRule::new().into()])
        );
    }

    #[test]
    fn test_min_and_max_join_branches() {
        let plan = LogicalPlanBuilder::new()
            .scan("t", 1)
            .aggregate(vec![], vec![min(col("t.a")), max(col("t.a"))])
            .build()
            .unwrap();

        let expected = r#"LogicalJoin { join_type: Inner, on: [] }
├─ LogicalAggregate { group_by: [], aggr: [MIN(t.a)] }
│  └─ LogicalLimit { count: 1 }
│     └─ LogicalSort { order: [t.a] }
│        └─ LogicalScan { table_name: "t", filters: [t.a IS NOT NULL] }
└─ LogicalAggregate { group_by: [], aggr: [MAX(t.a)] }
   └─ LogicalLimit { count: 1 }
      └─ LogicalSort { order: [t.a DESC] }
         └─ LogicalScan { table_name: "t", filters: [t.a IS NOT NULL] }
"#;
        assert_eq!(
            expected,
            rewrite_to_string(plan, vec![MinMaxEliminationRule::new().into()])
        );
    }

    #[test]
    fn test_range_filter_kept() {
        let plan = LogicalPlanBuilder::new()
            .scan_node(Scan::new("t", 1).with_filters(vec![col("t.a").gt(lit(10i64))]))
            .aggregate(vec![], vec![min(col("t.a"))])
            .build()
            .unwrap();

        let expected = r#"LogicalAggregate { group_by: [], aggr: [MIN(t.a)] }
└─ LogicalLimit { count: 1 }
   └─ LogicalSort { order: [t.a] }
      └─ LogicalScan { table_name: "t", filters: [t.a > Int64(10), t.a IS NOT NULL] }
"#;
        assert_eq!(
            expected,
            rewrite_to_string(plan, vec![MinMaxEliminationRule::new().into()])
        );
    }

    #[test]
    fn test_not_applicable() {
        // Group by.
        let plan = LogicalPlanBuilder::new()
            .scan("t", 1)
            .aggregate(vec![col("t.b")], vec![max(col("t.a"))])
            .build()
            .unwrap();
        assert!(!is_rewritten(plan));

        // No index on column.
        let plan = LogicalPlanBuilder::new()
            .scan("t", 1)
            .aggregate(vec![], vec![max(col("t.c"))])
            .build()
            .unwrap();
        assert!(!is_rewritten(plan));

        // Other aggregate.
        let plan = LogicalPlanBuilder::new()
            .scan("t", 1)
            .aggregate(vec![], vec![max(col("t.a")), count(col("t.b"))])
            .build()
            .unwrap();
        assert!(!is_rewritten(plan));

        // Filter on a column outside the index.
        let plan = LogicalPlanBuilder::new()
            .scan_node(Scan::new("t", 1).with_filters(vec![col("t.b").eq(lit(1i64))]))
            .aggregate(vec![], vec![max(col("t.a"))])
            .build()
            .unwrap();
        assert!(!is_rewritten(plan));
    }
}
