use crate::error::QuartziteResult;
use crate::plan::PlanNodeRef;

pub trait Visitor {
    /// Context
    type C;
    type R;
    fn visit(&mut self, context: Self::C, node: PlanNodeRef) -> QuartziteResult<Self::R>;
}

pub fn visit<V>(visitor: &mut V, context: V::C, root: PlanNodeRef) -> QuartziteResult<V::R>
where
    V: Visitor,
{
    visitor.visit(context, root)
}
