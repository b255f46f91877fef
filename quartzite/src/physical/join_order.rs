use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{anyhow, ensure};
use datafusion_common::Column;
use datafusion_expr::{Expr, JoinType};
use log::debug;

use crate::error::QuartziteResult;
use crate::hint::{QueryBlockId, ResolvedHints};
use crate::operator::LogicalOperator::{LogicalJoin, LogicalProjection};
use crate::operator::Operator::Logical;
use crate::operator::{Join, JoinKey, OperatorTrait, Projection};
use crate::optimizer::OptimizerContext;
use crate::physical::join::single_table;
use crate::plan::{Plan, PlanNodeBuilder, PlanNodeIdGen, PlanNodeRef};
use crate::properties::LogicalProperty;

/// Inner joins of one query block flattened into their inputs.
#[derive(Default)]
struct JoinGroup {
    leaves: Vec<PlanNodeRef>,
    /// Table name of each leaf, lowercase.
    names: Vec<Option<String>>,
    keys: Vec<JoinKey>,
    /// Tables under each join of the group.
    subtrees: Vec<BTreeSet<String>>,
}

impl JoinGroup {
    fn leaf_of(&self, table: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_deref() == Some(table))
    }

    /// Leaves producing each column of `key`.
    fn key_leaves(&self, key: &JoinKey) -> (Option<usize>, Option<usize>) {
        let find = |column: &Column| {
            self.leaves.iter().position(|l| {
                l.logical_prop()
                    .map(|p| p.contains_column(column))
                    .unwrap_or(false)
            })
        };
        (find(&key.0), find(&key.1))
    }

    /// Whether `leaf` shares a join key with any leaf in `joined`.
    fn connected(&self, joined: &[usize], leaf: usize) -> bool {
        self.keys.iter().any(|key| match self.key_leaves(key) {
            (Some(l), Some(r)) => {
                (l == leaf && joined.contains(&r)) || (r == leaf && joined.contains(&l))
            }
            _ => false,
        })
    }
}

/// Moves tables named together by a join hint next to each other.
///
/// A join hint only applies to a join whose inputs are the hinted tables. Inner joins of a query
/// block are flattened into a group, and when a hint names tables of the group which are not yet
/// joined directly, the group is rebuilt left deep starting with those tables. Other inputs follow
/// in plan order, preferring ones sharing a join key with what is already joined.
pub(super) struct JoinReorder<'a> {
    hints: &'a ResolvedHints,
    context: &'a OptimizerContext,
    id_gen: PlanNodeIdGen,
}

impl<'a> JoinReorder<'a> {
    pub(super) fn new(
        plan: &Plan,
        hints: &'a ResolvedHints,
        context: &'a OptimizerContext,
    ) -> Self {
        Self {
            hints,
            context,
            id_gen: PlanNodeIdGen::starting_at(plan.max_node_id() + 1),
        }
    }

    pub(super) fn reorder(mut self, plan: &Plan) -> QuartziteResult<Plan> {
        Ok(Plan::new(self.rewrite(&plan.root())?))
    }

    fn rewrite(&mut self, node: &PlanNodeRef) -> QuartziteResult<PlanNodeRef> {
        if let Some(block) = flattenable(node, None) {
            let mut group = JoinGroup::default();
            collect(node, block, &mut group);
            if let Some(order) = self.hinted_order(block, &group) {
                let leaves = group
                    .leaves
                    .iter()
                    .map(|l| self.rewrite(l))
                    .collect::<QuartziteResult<Vec<_>>>()?;
                group.leaves = leaves;
                return self.rebuild(node, block, group, order);
            }
        }

        let inputs = node
            .inputs()
            .iter()
            .map(|i| self.rewrite(i))
            .collect::<QuartziteResult<Vec<_>>>()?;
        if inputs.iter().zip(node.inputs()).all(|(a, b)| Arc::ptr_eq(a, b)) {
            return Ok(node.clone());
        }
        Ok(Arc::new(
            PlanNodeBuilder::new(node.id(), node.operator())
                .add_inputs(inputs)
                .with_logical_prop(node.logical_prop().cloned())
                .build(),
        ))
    }

    /// Leaf positions in join order, if some hint asks for a different order.
    fn hinted_order(&self, block: QueryBlockId, group: &JoinGroup) -> Option<Vec<usize>> {
        if group.leaves.len() > self.context.config.max_join_group_size {
            debug!(
                "Join group of {} tables is too large to reorder",
                group.leaves.len()
            );
            return None;
        }

        let hinted = self.hints.join_hints(block).iter().find_map(|hint| {
            if hint.tables.len() < 2 {
                return None;
            }
            let tables: BTreeSet<String> = hint.tables.iter().cloned().collect();
            if group.subtrees.contains(&tables) {
                return None;
            }
            let leaves = tables
                .iter()
                .map(|t| group.leaf_of(t))
                .collect::<Option<Vec<usize>>>()?;

            let mut joined = vec![leaves[0]];
            let mut rest: Vec<usize> = leaves[1..].to_vec();
            while let Some(pos) = rest.iter().position(|l| group.connected(&joined, *l)) {
                joined.push(rest.remove(pos));
            }
            if !rest.is_empty() {
                return None;
            }
            debug!("Reordering join group for hint {}", hint.text);
            Some(joined)
        })?;

        let mut order = hinted;
        let mut rest: Vec<usize> = (0..group.leaves.len())
            .filter(|l| !order.contains(l))
            .collect();
        while !rest.is_empty() {
            let pos = rest
                .iter()
                .position(|l| group.connected(&order, *l))
                .unwrap_or(0);
            order.push(rest.remove(pos));
        }
        Some(order)
    }

    fn rebuild(
        &mut self,
        original: &PlanNodeRef,
        block: QueryBlockId,
        group: JoinGroup,
        order: Vec<usize>,
    ) -> QuartziteResult<PlanNodeRef> {
        let mut pending = group.keys.clone();
        let mut iter = order.iter().map(|idx| group.leaves[*idx].clone());
        let mut current = iter
            .next()
            .ok_or_else(|| anyhow!("Empty join group at node {}", original.id()))?;
        for next in iter {
            current = self.join_with(current, next, block, &mut pending)?;
        }
        ensure!(
            pending.is_empty(),
            "Join keys {:?} left after reordering node {}",
            pending,
            original.id()
        );

        let original_prop = original
            .logical_prop()
            .ok_or_else(|| anyhow!("Node {} has no logical property", original.id()))?;
        let columns = original_prop.columns();
        if current.logical_prop().map(|p| p.columns()) == Some(columns.clone()) {
            return Ok(current);
        }

        let projection = Projection::new(columns.into_iter().map(Expr::Column));
        Ok(Arc::new(
            PlanNodeBuilder::new(self.id_gen.gen_next(), &Logical(LogicalProjection(projection)))
                .add_inputs(vec![current])
                .with_logical_prop(Some(original_prop.clone()))
                .build(),
        ))
    }

    fn join_with(
        &mut self,
        left: PlanNodeRef,
        right: PlanNodeRef,
        block: QueryBlockId,
        pending: &mut Vec<JoinKey>,
    ) -> QuartziteResult<PlanNodeRef> {
        let left_prop = prop_of(&left)?;
        let right_prop = prop_of(&right)?;

        let mut on = vec![];
        pending.retain(|(a, b)| {
            if left_prop.contains_column(a) && right_prop.contains_column(b) {
                on.push((a.clone(), b.clone()));
                false
            } else if left_prop.contains_column(b) && right_prop.contains_column(a) {
                on.push((b.clone(), a.clone()));
                false
            } else {
                true
            }
        });

        let join = Join::new(JoinType::Inner, on, block);
        let prop = join.derive_logical_prop(&[left_prop, right_prop], self.context)?;
        Ok(Arc::new(
            PlanNodeBuilder::new(self.id_gen.gen_next(), &Logical(LogicalJoin(join)))
                .add_inputs(vec![left, right])
                .with_logical_prop(Some(prop))
                .build(),
        ))
    }
}

fn prop_of(node: &PlanNodeRef) -> QuartziteResult<&LogicalProperty> {
    node.logical_prop()
        .ok_or_else(|| anyhow!("Node {} has no logical property", node.id()))
}

/// Block of `node` if it is an inner join without extra condition, in `block` when given.
fn flattenable(node: &PlanNodeRef, block: Option<QueryBlockId>) -> Option<QueryBlockId> {
    match node.operator() {
        Logical(LogicalJoin(join))
            if join.join_type() == JoinType::Inner
                && join.filter().is_none()
                && !join.null_aware()
                && block.map(|b| b == join.block()).unwrap_or(true) =>
        {
            Some(join.block())
        }
        _ => None,
    }
}

/// Adds joins and leaves under `node` to `group`, returns tables under `node`.
fn collect(node: &PlanNodeRef, block: QueryBlockId, group: &mut JoinGroup) -> BTreeSet<String> {
    match node.operator() {
        Logical(LogicalJoin(join)) if flattenable(node, Some(block)).is_some() => {
            let mut tables = BTreeSet::new();
            for input in node.inputs() {
                tables.extend(collect(input, block, group));
            }
            group.keys.extend(join.on().iter().cloned());
            group.subtrees.push(tables.clone());
            tables
        }
        _ => {
            let name = single_table(node);
            group.leaves.push(node.clone());
            group.names.push(name.clone());
            name.into_iter().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use datafusion_expr::JoinType;

    use crate::hint::{HintComment, HintResolver, QueryBlocks};
    use crate::optimizer::OptimizerContext;
    use crate::physical::join_order::JoinReorder;
    use crate::physical::planner::with_logical_props;
    use crate::plan::explain::explain_to_string;
    use crate::plan::{LogicalPlanBuilder, Plan};
    use crate::test_utils::{column, test_context};
    use crate::warning::WarningCollector;

    fn three_way_join() -> Plan {
        let t2 = LogicalPlanBuilder::new().scan("t2", 1).build().unwrap();
        let t3 = LogicalPlanBuilder::new().scan("t3", 1).build().unwrap();
        LogicalPlanBuilder::new()
            .scan("t1", 1)
            .join(JoinType::Inner, vec![(column("t1.a"), column("t2.a"))], t2)
            .join(JoinType::Inner, vec![(column("t1.b"), column("t3.b"))], t3)
            .build()
            .unwrap()
    }

    fn reorder(plan: Plan, hints: &str, context: &OptimizerContext) -> String {
        let mut warnings = WarningCollector::new();
        let blocks = QueryBlocks::from_plan(&plan);
        let resolved = HintResolver::new(&blocks, context.catalog.as_ref())
            .resolve(&[HintComment::text(1, hints)], &mut warnings);
        let plan = Plan::new(with_logical_props(&plan.root(), context).unwrap());
        let reordered = JoinReorder::new(&plan, &resolved, context)
            .reorder(&plan)
            .unwrap();
        explain_to_string(&reordered).unwrap()
    }

    #[test]
    fn test_reorder_for_hint() {
        let context = test_context();
        let explain = reorder(three_way_join(), "HASH_JOIN(t1, t3)", &context);
        let expected = "\
LogicalProjection { expr: [t1.id, t1.a, t1.b, t1.c, t2.id, t2.a, t2.b, t2.c, t3.a, t3.b, t3.c] }
└─ LogicalJoin { join_type: Inner, on: [t1.a = t2.a] }
   ├─ LogicalJoin { join_type: Inner, on: [t1.b = t3.b] }
   │  ├─ LogicalScan { table_name: \"t1\" }
   │  └─ LogicalScan { table_name: \"t3\" }
   └─ LogicalScan { table_name: \"t2\" }
";
        assert_eq!(expected, explain);
    }

    #[test]
    fn test_no_reorder_when_already_adjacent() {
        let context = test_context();
        let explain = reorder(three_way_join(), "HASH_JOIN(t1, t2)", &context);
        assert!(!explain.starts_with("LogicalProjection"));
    }

    #[test]
    fn test_no_reorder_when_unconnected() {
        let context = test_context();
        let explain = reorder(three_way_join(), "HASH_JOIN(t2, t3)", &context);
        assert!(explain.starts_with("LogicalJoin { join_type: Inner, on: [t1.b = t3.b] }"));
    }
}
