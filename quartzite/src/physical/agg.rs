use datafusion_common::Column;
use datafusion_expr::expr::AggregateFunction;
use datafusion_expr::{AggregateFunction as AggregateKind, Expr};
use itertools::Itertools;
use log::debug;

use crate::error::QuartziteResult;
use crate::hint::AggStrategy;
use crate::operator::LogicalOperator::LogicalScan;
use crate::operator::Operator::Logical;
use crate::operator::PhysicalOperator::{PhysicalHashAgg, PhysicalStreamAgg};
use crate::operator::{Aggregate, HashAgg, Scan, StreamAgg};
use crate::physical::planner::input;
use crate::physical::{Candidate, PhysicalPlanner, PhysicalRequirement};
use crate::plan::{PlanNodeRef, Visitor};
use crate::properties::{OrderSpec, Ordering};
use crate::stat::{table_stats_or_pseudo, SELECTION_FACTOR};

fn group_columns(agg: &Aggregate) -> Option<Vec<Column>> {
    agg.group_by()
        .iter()
        .map(|e| match e {
            Expr::Column(c) => Some(c.clone()),
            _ => None,
        })
        .collect()
}

/// Whether a partial aggregation of `agg` can run in the access layer below it.
fn can_push_down(agg: &Aggregate, input: &PlanNodeRef) -> bool {
    if !matches!(input.operator(), Logical(LogicalScan(_))) || group_columns(agg).is_none() {
        return false;
    }
    agg.aggr().iter().all(|e| match e.clone().unalias() {
        Expr::AggregateFunction(AggregateFunction {
            fun,
            args,
            distinct,
            filter,
            ..
        }) => {
            matches!(
                fun,
                AggregateKind::Count
                    | AggregateKind::Sum
                    | AggregateKind::Min
                    | AggregateKind::Max
                    | AggregateKind::Avg
            ) && !distinct
                && filter.is_none()
                && args
                    .iter()
                    .all(|a| matches!(a, Expr::Column(_) | Expr::Literal(_)))
        }
        _ => false,
    })
}

/// Orders of the input which let a stream aggregation see each group contiguously.
///
/// Group columns ascending in written order always qualify. A scan input adds the orders of its
/// handle and index prefixes covering exactly the group columns.
fn stream_orders(
    group: &[Column],
    input: &PlanNodeRef,
    planner: &PhysicalPlanner,
) -> Vec<OrderSpec> {
    let mut orders = vec![OrderSpec::new(group.iter().cloned().map(Ordering::asc))];
    let scan = match input.operator() {
        Logical(LogicalScan(scan)) if !group.is_empty() => scan,
        _ => return orders,
    };
    let table = match planner.context.catalog.table(scan.table_name()) {
        Some(table) => table,
        None => return orders,
    };

    let mut prefixes: Vec<Vec<String>> = table
        .indexes()
        .iter()
        .map(|i| i.column_names().map(|n| n.to_string()).collect())
        .collect();
    if let Some(handle) = table.handle() {
        prefixes.push(vec![handle.to_string()]);
    }
    for columns in prefixes {
        if columns.len() < group.len() {
            continue;
        }
        let prefix: Vec<Column> = columns[..group.len()]
            .iter()
            .map(|n| scan.column(n))
            .collect();
        if prefix.iter().all(|c| group.contains(c)) && prefix.iter().all_unique() {
            let order = OrderSpec::new(prefix.into_iter().map(Ordering::asc));
            if !orders.contains(&order) {
                orders.push(order);
            }
        }
    }
    orders
}

/// Estimated number of groups, between one and `rows`.
fn estimate_groups(
    group: Option<&[Column]>,
    input: &PlanNodeRef,
    planner: &PhysicalPlanner,
    rows: f64,
) -> f64 {
    let groups = match (group, input.operator()) {
        (Some([]), _) => Some(1.0),
        (Some(columns), Logical(LogicalScan(scan))) => scan_ndv(scan, columns, planner),
        _ => None,
    }
    .unwrap_or(rows * SELECTION_FACTOR);
    groups.min(rows).max(1.0)
}

fn scan_ndv(scan: &Scan, columns: &[Column], planner: &PhysicalPlanner) -> Option<f64> {
    let stats = table_stats_or_pseudo(planner.context.stats.as_ref(), scan.table_name());
    columns
        .iter()
        .map(|c| stats.column(&c.name).map(|s| s.ndv()))
        .product()
}

impl<'a> PhysicalPlanner<'a> {
    pub(super) fn plan_aggregate(
        &mut self,
        node: &PlanNodeRef,
        agg: &Aggregate,
    ) -> QuartziteResult<Vec<Candidate>> {
        let child = input(node, 0)?;
        let group = group_columns(agg);
        let pushdown = can_push_down(agg, &child);
        let strategy = self.hints.agg_strategy(agg.block());

        let mut candidates = vec![];
        if strategy != Some(AggStrategy::Hash) {
            if let Some(group) = &group {
                for order in stream_orders(group, &child, self) {
                    let input =
                        self.visit(PhysicalRequirement::ordered(order.clone()), child.clone())?;
                    let cost = self.cost_model.stream_agg(input.rows);
                    let rows = estimate_groups(Some(group.as_slice()), &child, self, input.rows);
                    candidates.push(self.build_candidate(
                        node,
                        PhysicalStreamAgg(StreamAgg::new(agg, pushdown)),
                        &[&input],
                        cost,
                        rows,
                        order,
                    ));
                }
            } else if strategy == Some(AggStrategy::Stream) {
                debug!(
                    "Stream aggregation of node {} needs plain group by columns, using hash",
                    node.id()
                );
            }
        }

        if strategy != Some(AggStrategy::Stream) || candidates.is_empty() {
            let input = self.visit(PhysicalRequirement::default(), child.clone())?;
            let rows = estimate_groups(group.as_deref(), &child, self, input.rows);
            let cost = self.cost_model.hash_agg(input.rows, rows);
            candidates.push(
                self.build_candidate(
                    node,
                    PhysicalHashAgg(HashAgg::new(agg, pushdown)),
                    &[&input],
                    cost,
                    rows,
                    OrderSpec::default(),
                )
                .with_preference(1),
            );
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use datafusion_expr::{col, count, lit, max, sum, Expr};

    use crate::hint::{HintComment, HintResolver, QueryBlocks};
    use crate::operator::Aggregate;
    use crate::operator::LogicalOperator::LogicalAggregate;
    use crate::operator::Operator::Logical;
    use crate::physical::agg::can_push_down;
    use crate::physical::PhysicalPlanner;
    use crate::plan::explain::explain_to_string;
    use crate::plan::{LogicalPlanBuilder, Plan};
    use crate::test_utils::test_context;
    use crate::warning::WarningCollector;

    fn plan(plan: Plan, hints: &str) -> (String, Plan, WarningCollector) {
        let context = test_context();
        let mut warnings = WarningCollector::new();
        let blocks = QueryBlocks::from_plan(&plan);
        let resolved = HintResolver::new(&blocks, context.catalog.as_ref())
            .resolve(&[HintComment::text(1, hints)], &mut warnings);
        let physical = PhysicalPlanner::new(&context, &resolved, &mut warnings)
            .plan(&plan)
            .unwrap();
        (explain_to_string(&physical).unwrap(), physical, warnings)
    }

    fn group_by_b(table: &str, aggr: Expr) -> Plan {
        LogicalPlanBuilder::new()
            .scan(table, 1)
            .aggregate(vec![col(format!("{}.b", table).as_str())], vec![aggr])
            .build()
            .unwrap()
    }

    fn root_aggregate(plan: &Plan) -> Aggregate {
        match plan.root().operator() {
            Logical(LogicalAggregate(agg)) => agg.clone(),
            op => panic!("unexpected root {}", op),
        }
    }

    #[test]
    fn test_push_down() {
        let plan = group_by_b("t3", sum(col("t3.a")));
        let agg = root_aggregate(&plan);
        assert!(can_push_down(&agg, &plan.root().inputs()[0]));

        let filtered = LogicalPlanBuilder::new()
            .scan("t3", 1)
            .filter(col("t3.a").gt(lit(1i64)))
            .aggregate(vec![], vec![count(col("t3.a"))])
            .build()
            .unwrap();
        let agg = root_aggregate(&filtered);
        assert!(!can_push_down(&agg, &filtered.root().inputs()[0]));
    }

    #[test]
    fn test_stream_agg_hint_adds_sort() {
        let (explain, physical, warnings) = plan(group_by_b("t3", sum(col("t3.a"))), "STREAM_AGG()");
        assert!(warnings.is_empty());
        let expected = "\
PhysicalStreamAgg { group_by: [t3.b], aggr: [SUM(t3.a)], pushdown: true }
└─ PhysicalSort { order: [t3.b] }
   └─ PhysicalTableReader { table_name: \"t3\", access: TableScan }
";
        assert_eq!(expected, explain);
        assert_eq!(
            "[t3.b]",
            physical.root().physical_props().unwrap().orders().to_string()
        );
    }

    #[test]
    fn test_hash_agg_hint() {
        let (explain, _, warnings) = plan(group_by_b("t", sum(col("t.a"))), "HASH_AGG()");
        assert!(warnings.is_empty());
        assert!(explain.starts_with(
            "PhysicalHashAgg { group_by: [t.b], aggr: [SUM(t.a)], pushdown: true }"
        ));
    }

    #[test]
    fn test_stream_agg_over_index_order() {
        let (explain, _, _) = plan(group_by_b("t", max(col("t.c"))), "STREAM_AGG()");
        assert!(explain.starts_with("PhysicalStreamAgg"));
        assert!(!explain.contains("PhysicalSort"));
        assert!(explain.contains("access: IndexScan, index: \"idx_bc\""));
    }

    #[test]
    fn test_conflicting_agg_hints() {
        let (_, _, warnings) = plan(group_by_b("t3", sum(col("t3.a"))), "HASH_AGG() STREAM_AGG()");
        assert_eq!(1, warnings.len());
    }

    #[test]
    fn test_stream_agg_hint_on_expression_falls_back() {
        let aggregated = LogicalPlanBuilder::new()
            .scan("t3", 1)
            .aggregate(vec![col("t3.a") + col("t3.b")], vec![max(col("t3.c"))])
            .build()
            .unwrap();
        let (explain, _, _) = plan(aggregated, "STREAM_AGG()");
        assert!(explain.starts_with("PhysicalHashAgg"));
    }
}
