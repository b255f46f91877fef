//! Plan representation shared by the rewrite phase and the physical planner.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::operator::Operator;
use crate::properties::{LogicalProperty, PhysicalPropertySet};
use crate::stat::Statistics;

mod builder;
pub use builder::*;
pub mod explain;
mod visit;
pub use visit::*;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Arc<PlanNode>;

#[derive(Clone, Debug, Default)]
pub struct PlanNodeIdGen {
    next: PlanNodeId,
}

impl PlanNodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator whose first id is `first`.
    pub fn starting_at(first: PlanNodeId) -> Self {
        Self { next: first }
    }

    pub fn gen_next(&mut self) -> PlanNodeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// One node in a plan.
///
/// This is used in both input and output of an optimizer. Given that we may have many different
/// phases in query optimization, we use one data structure to represent a plan.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: Operator,
    inputs: Vec<PlanNodeRef>,
    logical_prop: Option<LogicalProperty>,
    stat: Option<Statistics>,
    physical_props: Option<PhysicalPropertySet>,
}

/// The `eq` should ignore `id`.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.inputs == other.inputs
            && self.logical_prop == other.logical_prop
            && self.stat == other.stat
            && self.physical_props == other.physical_props
    }
}

/// A query plan.
///
/// A plan is a single root tree, each node exclusively owns its inputs. It is used both as the
/// logical plan handed to the optimizer and as the physical plan it produces.
#[derive(PartialEq, Debug, Clone)]
pub struct Plan {
    root: PlanNodeRef,
}

/// Breadth first iterator of a plan tree.
struct BFSPlanNodeIter {
    queue: VecDeque<PlanNodeRef>,
}

impl Iterator for BFSPlanNodeIter {
    type Item = PlanNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.inputs.iter().cloned());
        Some(node)
    }
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    pub fn bfs_iterator(&self) -> impl Iterator<Item = PlanNodeRef> {
        BFSPlanNodeIter {
            queue: VecDeque::from(vec![self.root.clone()]),
        }
    }

    pub fn max_node_id(&self) -> PlanNodeId {
        self.bfs_iterator().map(|n| n.id).max().unwrap_or_default()
    }
}

impl PlanNode {
    pub fn new(id: PlanNodeId, operator: Operator, inputs: Vec<PlanNodeRef>) -> Self {
        Self {
            id,
            operator,
            inputs,
            logical_prop: None,
            stat: None,
            physical_props: None,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn logical_prop(&self) -> Option<&LogicalProperty> {
        self.logical_prop.as_ref()
    }

    pub fn stat(&self) -> Option<&Statistics> {
        self.stat.as_ref()
    }

    pub fn physical_props(&self) -> Option<&PhysicalPropertySet> {
        self.physical_props.as_ref()
    }
}

pub struct PlanNodeBuilder {
    plan_node: PlanNode,
}

impl PlanNodeBuilder {
    pub fn new(id: PlanNodeId, operator: &Operator) -> Self {
        Self {
            plan_node: PlanNode::new(id, operator.clone(), vec![]),
        }
    }

    pub fn add_inputs<I>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        self.plan_node.inputs.extend(inputs);
        self
    }

    pub fn with_logical_prop(mut self, logical_prop: Option<LogicalProperty>) -> Self {
        self.plan_node.logical_prop = logical_prop;
        self
    }

    pub fn with_statistics(mut self, stat: Option<Statistics>) -> Self {
        self.plan_node.stat = stat;
        self
    }

    pub fn with_physical_props(mut self, physical_props: Option<PhysicalPropertySet>) -> Self {
        self.plan_node.physical_props = physical_props;
        self
    }

    pub fn build(self) -> PlanNode {
        self.plan_node
    }
}

#[cfg(test)]
mod tests {
    use crate::plan::LogicalPlanBuilder;

    #[test]
    fn test_bfs_visits_every_node_once() {
        let right = LogicalPlanBuilder::new().scan("t2", 1).build().unwrap();
        let plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .cross_join(right)
            .limit(10)
            .build()
            .unwrap();

        let names: Vec<String> = plan
            .bfs_iterator()
            .map(|n| n.operator().to_string())
            .collect();
        assert_eq!(4, names.len());
        assert!(names[0].starts_with("LogicalLimit"));
        assert!(names[1].starts_with("LogicalJoin"));
        assert_eq!(3, plan.max_node_id());
    }
}
