pub mod schema;

use quartzite::hint::HintComment;
use quartzite::optimizer::{optimize, OptimizedPlan, OptimizerContext};
use quartzite::plan::explain::explain_to_string;
use quartzite::plan::Plan;
use quartzite::warning::PlanWarning;

/// Optimized plan rendered for assertions.
pub struct Explained {
    pub logical: String,
    pub physical: String,
    pub warnings: Vec<PlanWarning>,
    pub plan: OptimizedPlan,
}

/// Optimizes `plan` with `hints` written in its outermost query block.
pub fn optimize_with_hints(context: &OptimizerContext, plan: Plan, hints: &str) -> Explained {
    let comments = if hints.is_empty() {
        vec![]
    } else {
        vec![HintComment::text(1, hints)]
    };
    let optimized = optimize(context, plan, &comments).unwrap();
    Explained {
        logical: explain_to_string(&optimized.logical_plan).unwrap(),
        physical: explain_to_string(&optimized.physical_plan).unwrap(),
        warnings: optimized.warnings.clone(),
        plan: optimized,
    }
}
