use std::fmt::Debug;
use std::sync::Arc;

use log::info;

use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::OptimizerConfig;
use crate::error::QuartziteResult;
use crate::heuristic::{HepOptimizer, MatchOrder};
use crate::hint::{HintComment, HintResolver, QueryBlocks};
use crate::operator::Operator;
use crate::physical::PhysicalPlanner;
use crate::plan::explain::explain_to_string;
use crate::plan::Plan;
use crate::properties::LogicalProperty;
use crate::rules::rule_set;
use crate::stat::{MemoryStatsProvider, StatsProvider};
use crate::warning::{PlanWarning, WarningCollector};

/// Context for optimization. Includes access to catalog, statistics and configuration.
///
/// Catalog and statistics are frozen snapshots for the duration of one planning call.
#[derive(Clone)]
pub struct OptimizerContext {
    pub catalog: Arc<dyn Catalog>,
    pub stats: Arc<dyn StatsProvider>,
    pub config: OptimizerConfig,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::default()),
            stats: Arc::new(MemoryStatsProvider::default()),
            config: OptimizerConfig::default(),
        }
    }
}

impl OptimizerContext {
    pub fn new(catalog: Arc<dyn Catalog>, stats: Arc<dyn StatsProvider>) -> Self {
        Self {
            catalog,
            stats,
            config: OptimizerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }
}

/// Optimizer interface.
///
/// All information required by optimizer, such as rule set, input plan, required property are
/// passed by optimizer in constructor, since different optimizer may require different information.
///
/// The concepts of `group` and `group expression` are borrowed from cascades optimizer. Each
/// `group` consists of several `group expressions`, and all group expressions represents
/// logically same plan, e.g. return same result set. In heuristic optimizer, they are same
/// thing, just a node in plan graph.
pub trait Optimizer {
    type GroupHandle: OptGroupHandle<O = Self>;
    type ExprHandle: OptExprHandle<O = Self>;
    type Group: OptGroup;
    type Expr: OptExpr<O = Self, InputHandle = Self::GroupHandle>;

    /// These methods are accessed by rules.
    fn context(&self) -> &OptimizerContext;
    fn group_at(&self, group_handle: Self::GroupHandle) -> &Self::Group;
    fn expr_at(&self, expr_handle: Self::ExprHandle) -> &Self::Expr;

    /// Entry point to drive optimization process.
    fn find_best_plan(self) -> QuartziteResult<Plan>;
}

pub trait OptExpr {
    type O: Optimizer;
    type InputHandle: OptGroupHandle;

    fn operator(&self) -> &Operator;
    fn logical_prop(&self) -> &LogicalProperty;
    fn inputs_len(&self, opt: &Self::O) -> usize;
    fn input_at(&self, idx: usize, opt: &Self::O) -> QuartziteResult<Self::InputHandle>;
}

pub trait OptGroup {
    fn logical_prop(&self) -> &LogicalProperty;
    /// Operator of the first expression of this group.
    fn first_operator(&self) -> &Operator;
}

pub trait OptExprHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<ExprHandle = Self>;
}

pub trait OptGroupHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<GroupHandle = Self>;
}

/// Result of [`optimize`].
#[derive(Debug)]
pub struct OptimizedPlan {
    /// Logical plan after rewrite rules.
    pub logical_plan: Plan,
    pub physical_plan: Plan,
    pub warnings: Vec<PlanWarning>,
}

/// Plans one statement.
///
/// Hints are resolved against the query blocks of `plan`, rewrite rules run to a fixed point, and
/// the physical planner picks access paths and operator strategies bottom up. Hint problems and
/// range builder limitations only produce warnings.
pub fn optimize(
    context: &OptimizerContext,
    plan: Plan,
    hints: &[HintComment],
) -> QuartziteResult<OptimizedPlan> {
    let mut warnings = WarningCollector::new();

    let blocks = QueryBlocks::from_plan(&plan);
    let hints = HintResolver::new(&blocks, context.catalog.as_ref()).resolve(hints, &mut warnings);

    let logical_plan = HepOptimizer::new(
        MatchOrder::TopDown,
        context.config.max_rewrite_iterations,
        rule_set(&context.config),
        plan,
        context.clone(),
    )?
    .find_best_plan()?;
    info!("Logical plan after rewrite:\n{}", explain_to_string(&logical_plan)?);

    let physical_plan = PhysicalPlanner::new(context, &hints, &mut warnings).plan(&logical_plan)?;
    info!("Physical plan:\n{}", explain_to_string(&physical_plan)?);

    Ok(OptimizedPlan {
        logical_plan,
        physical_plan,
        warnings: warnings.into_vec(),
    })
}
