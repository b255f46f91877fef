use anyhow::ensure;
use log::{debug, info};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::QuartziteResult;
use crate::heuristic::binding::Binding;
use crate::heuristic::graph::{HepOptimizerNode, PlanGraph};
use crate::heuristic::HepNodeId;
use crate::operator::OperatorTrait;
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::plan::{Plan, PlanNodeRef};
use crate::properties::LogicalProperty;
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::{OptExpression, Rule, RuleImpl, RuleResult};

/// Match order of plan tree.
#[derive(Copy, Clone, Debug)]
pub enum MatchOrder {
    BottomUp,
    TopDown,
}

pub struct HepOptimizer {
    match_order: MatchOrder,
    /// Max number of iteration
    max_iter_times: usize,
    rules: Vec<RuleImpl>,
    pub(super) graph: PlanGraph,
    context: OptimizerContext,
}

impl Optimizer for HepOptimizer {
    type Expr = HepOptimizerNode;
    type ExprHandle = HepNodeId;
    type Group = HepOptimizerNode;
    type GroupHandle = HepNodeId;

    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn group_at(&self, group_handle: HepNodeId) -> &HepOptimizerNode {
        &self.graph.graph[group_handle]
    }

    fn expr_at(&self, expr_handle: HepNodeId) -> &HepOptimizerNode {
        &self.graph.graph[expr_handle]
    }

    fn find_best_plan(mut self) -> QuartziteResult<Plan> {
        let rules = std::mem::take(&mut self.rules);
        let mut iterations = 0;
        while iterations < self.max_iter_times {
            iterations += 1;
            // The plan no longer changes after iteration
            let mut fixed_point = true;
            for node_id in self.graph.nodes_iter(self.match_order) {
                for rule in &rules {
                    if self.apply_rule(rule, node_id)? {
                        fixed_point = false;
                        break;
                    }
                }

                if !fixed_point {
                    break;
                }
            }

            if fixed_point {
                break;
            }
        }

        info!("Heuristic optimizer stopped after {} iterations", iterations);
        self.graph.to_plan()
    }
}

impl HepOptimizer {
    pub fn new(
        match_order: MatchOrder,
        max_iter_times: usize,
        rules: Vec<RuleImpl>,
        plan: Plan,
        context: OptimizerContext,
    ) -> QuartziteResult<Self> {
        let mut optimizer = Self {
            match_order,
            max_iter_times,
            rules,
            graph: PlanGraph::default(),
            context,
        };
        optimizer.init_with_plan(plan)?;
        Ok(optimizer)
    }

    pub fn root_node_id(&self) -> HepNodeId {
        self.graph.root
    }

    fn apply_rule(&mut self, rule: &RuleImpl, expr_handle: HepNodeId) -> QuartziteResult<bool> {
        let opt_expr = match Binding::new(expr_handle, rule.pattern(), self).next()? {
            Some(opt_expr) => opt_expr,
            None => return Ok(false),
        };

        let mut results = RuleResult::new();
        rule.apply(opt_expr, self, &mut results)?;

        let mut results = results.results();
        match results.next() {
            Some(new_expr) => {
                ensure!(
                    results.next().is_none(),
                    "Rewrite rule should not return more than 1 result."
                );
                debug!(
                    "Applying rule {:?} to expression {}",
                    rule, self.graph.graph[expr_handle].operator
                );
                self.replace_opt_expression(new_expr, expr_handle)
            }
            // No transformation generated.
            None => Ok(false),
        }
    }

    /// Replace relational expression with optimizer rule result.
    ///
    /// # Return
    ///
    /// The return value indicates whether graph changed.
    fn replace_opt_expression(
        &mut self,
        opt_node: OptExpression<HepOptimizer>,
        origin_node_id: HepNodeId,
    ) -> QuartziteResult<bool> {
        let new_hep_node_id = self.insert_opt_node(&opt_node)?;
        if new_hep_node_id == origin_node_id {
            return Ok(false);
        }

        // Redirect parents's child to new node
        let parent_edges: Vec<(HepNodeId, usize)> = self
            .graph
            .graph
            .edges_directed(origin_node_id, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect();
        for (parent, idx) in parent_edges {
            self.graph.graph.add_edge(parent, new_hep_node_id, idx);
        }
        self.graph.graph.remove_node(origin_node_id);

        if self.graph.root == origin_node_id {
            self.graph.root = new_hep_node_id;
        }
        self.graph.remove_unreachable();

        Ok(true)
    }

    fn insert_opt_node(&mut self, opt_expr: &OptExpression<HepOptimizer>) -> QuartziteResult<HepNodeId> {
        match opt_expr.node() {
            ExprHandleNode(expr_handle) => Ok(*expr_handle),
            GroupHandleNode(group_handle) => Ok(*group_handle),
            OperatorNode(operator) => {
                let input_hep_node_ids = opt_expr
                    .inputs()
                    .iter()
                    .map(|input_expr| self.insert_opt_node(input_expr))
                    .collect::<QuartziteResult<Vec<HepNodeId>>>()?;

                let logical_prop = {
                    let input_props: Vec<&LogicalProperty> = input_hep_node_ids
                        .iter()
                        .map(|id| &self.graph.graph[*id].logical_prop)
                        .collect();
                    operator.derive_logical_prop(&input_props, &self.context)?
                };

                let hep_node = HepOptimizerNode {
                    id: HepNodeId::default(),
                    operator: operator.clone(),
                    logical_prop,
                };

                let new_node_id = self.graph.graph.add_node(hep_node);
                // reset node id
                self.graph.graph[new_node_id].id = new_node_id;
                for (idx, input_hep_node_id) in input_hep_node_ids.into_iter().enumerate() {
                    self.graph.graph.add_edge(new_node_id, input_hep_node_id, idx);
                }

                Ok(new_node_id)
            }
        }
    }

    fn init_with_plan(&mut self, plan: Plan) -> QuartziteResult<()> {
        self.graph.root = self.insert_plan_node(&plan.root())?;
        Ok(())
    }

    fn insert_plan_node(&mut self, plan_node: &PlanNodeRef) -> QuartziteResult<HepNodeId> {
        let inputs = plan_node
            .inputs()
            .iter()
            .map(|input| self.insert_plan_node(input))
            .collect::<QuartziteResult<Vec<HepNodeId>>>()?;

        let opt_expr = OptExpression::<HepOptimizer>::with_operator(
            plan_node.operator().clone(),
            inputs
                .into_iter()
                .map(|id| OptExpression::with_expr_handle(id, vec![])),
        );
        self.insert_opt_node(&opt_expr)
    }
}
