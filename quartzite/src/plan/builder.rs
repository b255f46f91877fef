use std::sync::Arc;

use anyhow::anyhow;
use datafusion_common::{Column, DFSchemaRef};
use datafusion_expr::{Expr, JoinType};

use crate::error::QuartziteResult;
use crate::hint::QueryBlockId;
use crate::operator::LogicalOperator::{
    LogicalAggregate, LogicalDual, LogicalFilter, LogicalJoin, LogicalLimit, LogicalProjection,
    LogicalScan, LogicalSort, LogicalTopN, LogicalUnion,
};
use crate::operator::Operator::Logical;
use crate::operator::{
    Aggregate, Dual, Filter, Join, Limit, Operator, Projection, Scan, Sort, TopN, Union,
};
use crate::plan::{Plan, PlanNode, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::{OrderSpec, Ordering};

/// Builds logical plans bottom up.
///
/// Operators are stacked on the current root. Multi input operators take their other inputs as
/// finished plans, whose nodes are renumbered so ids stay unique.
pub struct LogicalPlanBuilder {
    root: Option<PlanNodeRef>,
    next_plan_node_id: PlanNodeId,
    block: QueryBlockId,
    missing_input: Option<&'static str>,
}

impl Default for LogicalPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalPlanBuilder {
    pub fn new() -> Self {
        Self {
            root: None,
            next_plan_node_id: 0,
            block: 1,
            missing_input: None,
        }
    }

    fn next_id(&mut self) -> PlanNodeId {
        let id = self.next_plan_node_id;
        self.next_plan_node_id += 1;
        id
    }

    fn reset_root(&mut self, new_root: PlanNodeRef) -> &mut Self {
        self.root = Some(new_root);
        self
    }

    fn push(&mut self, operator: Operator, others: Vec<Plan>, name: &'static str) -> &mut Self {
        let mut inputs = match self.root.take() {
            Some(root) => vec![root],
            None => {
                self.missing_input.get_or_insert(name);
                return self;
            }
        };
        for other in others {
            inputs.push(self.adopt(&other.root()));
        }

        let id = self.next_id();
        let node = PlanNode::new(id, operator, inputs);
        self.reset_root(Arc::new(node))
    }

    /// Copies a subtree with fresh ids.
    fn adopt(&mut self, node: &PlanNodeRef) -> PlanNodeRef {
        let inputs: Vec<PlanNodeRef> = node.inputs().iter().map(|i| self.adopt(i)).collect();
        let id = self.next_id();
        Arc::new(
            PlanNodeBuilder::new(id, node.operator())
                .add_inputs(inputs)
                .with_logical_prop(node.logical_prop().cloned())
                .build(),
        )
    }

    /// Sets query block of subsequent joins and aggregations.
    pub fn in_block(&mut self, block: QueryBlockId) -> &mut Self {
        self.block = block;
        self
    }

    pub fn scan<S: Into<String>>(&mut self, table_name: S, block: QueryBlockId) -> &mut Self {
        self.scan_node(Scan::new(table_name, block))
    }

    pub fn scan_as<S: Into<String>, A: Into<String>>(
        &mut self,
        table_name: S,
        alias: A,
        block: QueryBlockId,
    ) -> &mut Self {
        self.scan_node(Scan::new(table_name, block).with_alias(alias))
    }

    pub fn scan_node(&mut self, scan: Scan) -> &mut Self {
        self.block = scan.block();
        let id = self.next_id();
        let node = PlanNode::new(id, Logical(LogicalScan(scan)), vec![]);
        self.reset_root(Arc::new(node))
    }

    pub fn dual(&mut self, schema: DFSchemaRef) -> &mut Self {
        let id = self.next_id();
        let node = PlanNode::new(id, Logical(LogicalDual(Dual::new(schema))), vec![]);
        self.reset_root(Arc::new(node))
    }

    pub fn filter(&mut self, predicate: Expr) -> &mut Self {
        self.push(
            Logical(LogicalFilter(Filter::new(predicate))),
            vec![],
            "filter",
        )
    }

    pub fn projection<I: IntoIterator<Item = Expr>>(&mut self, exprs: I) -> &mut Self {
        self.push(
            Logical(LogicalProjection(Projection::new(exprs))),
            vec![],
            "projection",
        )
    }

    pub fn join(&mut self, join_type: JoinType, on: Vec<(Column, Column)>, right: Plan) -> &mut Self {
        let join = Join::new(join_type, on, self.block);
        self.join_node(join, right)
    }

    pub fn cross_join(&mut self, right: Plan) -> &mut Self {
        self.join(JoinType::Inner, vec![], right)
    }

    pub fn join_node(&mut self, join: Join, right: Plan) -> &mut Self {
        self.push(Logical(LogicalJoin(join)), vec![right], "join")
    }

    pub fn aggregate<G, A>(&mut self, group_by: G, aggr: A) -> &mut Self
    where
        G: IntoIterator<Item = Expr>,
        A: IntoIterator<Item = Expr>,
    {
        let agg = Aggregate::new(
            group_by.into_iter().collect(),
            aggr.into_iter().collect(),
            self.block,
        );
        self.push(Logical(LogicalAggregate(agg)), vec![], "aggregate")
    }

    pub fn sort<I: IntoIterator<Item = Ordering>>(&mut self, orders: I) -> &mut Self {
        self.push(
            Logical(LogicalSort(Sort::new(OrderSpec::new(orders)))),
            vec![],
            "sort",
        )
    }

    pub fn limit(&mut self, count: usize) -> &mut Self {
        self.push(Logical(LogicalLimit(Limit::new(count))), vec![], "limit")
    }

    pub fn limit_with_offset(&mut self, offset: usize, count: usize) -> &mut Self {
        self.push(
            Logical(LogicalLimit(Limit::with_offset(offset, count))),
            vec![],
            "limit",
        )
    }

    pub fn top_n<I: IntoIterator<Item = Ordering>>(&mut self, orders: I, count: usize) -> &mut Self {
        let top_n = TopN::new(OrderSpec::new(orders), Limit::new(count));
        self.push(Logical(LogicalTopN(top_n)), vec![], "top_n")
    }

    pub fn union<I: IntoIterator<Item = Plan>>(&mut self, others: I) -> &mut Self {
        self.push(
            Logical(LogicalUnion(Union::new())),
            others.into_iter().collect(),
            "union",
        )
    }

    /// Consume current plan, but not rest state, e.g. plan node id.
    pub fn build(&mut self) -> QuartziteResult<Plan> {
        if let Some(name) = self.missing_input.take() {
            self.root = None;
            return Err(anyhow!("Operator {} has no input", name));
        }
        self.root
            .take()
            .map(Plan::new)
            .ok_or_else(|| anyhow!("Can't build an empty plan"))
    }
}

#[cfg(test)]
mod tests {
    use crate::plan::LogicalPlanBuilder;

    #[test]
    fn test_operator_without_input() {
        assert!(LogicalPlanBuilder::new().limit(10).build().is_err());
        assert!(LogicalPlanBuilder::new().build().is_err());
    }

    #[test]
    fn test_union_renumbers_inputs() {
        let other = LogicalPlanBuilder::new().scan("t2", 2).build().unwrap();
        let plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .union(vec![other])
            .build()
            .unwrap();

        let mut ids: Vec<u32> = plan.bfs_iterator().map(|n| n.id()).collect();
        ids.sort_unstable();
        assert_eq!(vec![0, 1, 2], ids);
    }
}
