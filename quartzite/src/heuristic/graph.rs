use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use petgraph::prelude::{NodeIndex, StableGraph};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::{Directed, Direction};

use crate::error::QuartziteResult;
use crate::heuristic::{HepOptimizer, MatchOrder};
use crate::operator::Operator;
use crate::optimizer::{OptExpr, OptExprHandle, OptGroup, OptGroupHandle};
use crate::plan::{Plan, PlanNodeBuilder, PlanNodeId, PlanNodeIdGen, PlanNodeRef};
use crate::properties::LogicalProperty;

/// Edge weight is the position of target in inputs of source.
type HepGraph = StableGraph<HepOptimizerNode, usize, Directed, PlanNodeId>;
pub type HepNodeId = NodeIndex<PlanNodeId>;

pub struct HepOptimizerNode {
    pub(super) id: HepNodeId,
    pub(super) operator: Operator,
    pub(super) logical_prop: LogicalProperty,
}

/// A plan should be a single root tree.
#[derive(Default)]
pub(super) struct PlanGraph {
    pub(super) graph: HepGraph,
    pub(super) root: HepNodeId,
}

impl PlanGraph {
    pub(super) fn nodes_iter(&self, match_order: MatchOrder) -> Vec<HepNodeId> {
        let mut ids = Vec::with_capacity(self.graph.node_count());
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(node_id) = bfs.next(&self.graph) {
            ids.push(node_id);
        }

        if let MatchOrder::BottomUp = match_order {
            ids.reverse();
        }
        ids
    }

    /// Inputs of `node_id` in order.
    pub(super) fn inputs_of(&self, node_id: HepNodeId) -> Vec<HepNodeId> {
        let mut edges: Vec<(usize, HepNodeId)> = self
            .graph
            .edges_directed(node_id, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(idx, _)| *idx);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Removes nodes no longer reachable from root, e.g. inner nodes of a replaced sub tree.
    pub(super) fn remove_unreachable(&mut self) {
        let mut reachable = HashSet::with_capacity(self.graph.node_count());
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(node_id) = bfs.next(&self.graph) {
            reachable.insert(node_id);
        }

        let unreachable: Vec<HepNodeId> = self
            .graph
            .node_indices()
            .filter(|id| !reachable.contains(id))
            .collect();
        for id in unreachable {
            self.graph.remove_node(id);
        }
    }

    pub(super) fn to_plan(&self) -> QuartziteResult<Plan> {
        let mut id_gen = PlanNodeIdGen::new();
        self.to_plan_node(self.root, &mut id_gen).map(Plan::new)
    }

    fn to_plan_node(
        &self,
        node_id: HepNodeId,
        id_gen: &mut PlanNodeIdGen,
    ) -> QuartziteResult<PlanNodeRef> {
        let inputs = self
            .inputs_of(node_id)
            .into_iter()
            .map(|input| self.to_plan_node(input, id_gen))
            .collect::<QuartziteResult<Vec<PlanNodeRef>>>()?;

        let node = self
            .graph
            .node_weight(node_id)
            .ok_or_else(|| anyhow!("Node {:?} not found in plan graph", node_id))?;
        let plan_node = PlanNodeBuilder::new(id_gen.gen_next(), &node.operator)
            .with_logical_prop(Some(node.logical_prop.clone()))
            .add_inputs(inputs)
            .build();
        Ok(Arc::new(plan_node))
    }
}

impl OptGroup for HepOptimizerNode {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    fn first_operator(&self) -> &Operator {
        &self.operator
    }
}

impl OptExpr for HepOptimizerNode {
    type InputHandle = HepNodeId;
    type O = HepOptimizer;

    fn operator(&self) -> &Operator {
        &self.operator
    }

    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    fn inputs_len(&self, opt: &HepOptimizer) -> usize {
        opt.graph
            .graph
            .neighbors_directed(self.id, Direction::Outgoing)
            .count()
    }

    fn input_at(&self, idx: usize, opt: &HepOptimizer) -> QuartziteResult<HepNodeId> {
        match opt
            .graph
            .graph
            .edges_directed(self.id, Direction::Outgoing)
            .find(|e| *e.weight() == idx)
        {
            Some(edge) => Ok(edge.target()),
            None => bail!("Input {} of node {:?} not found", idx, self.id),
        }
    }
}

impl OptExprHandle for HepNodeId {
    type O = HepOptimizer;
}

impl OptGroupHandle for HepNodeId {
    type O = HepOptimizer;
}
