//! Rewrite rules run by the heuristic optimizer.
//!
//! Every rule here produces a plan assumed to be no worse than its input, for example
//! [`MergeLimitRule`] which folds two adjacent limits into one. The heuristic optimizer applies
//! them until the plan stops changing. Choosing access paths, join algorithms and aggregation
//! strategies is left to the physical planner, which runs afterwards.
//!
//! ## Pattern
//!
//! A rule never walks the plan itself. It declares a [`Pattern`] and the optimizer binds matching
//! sub trees into an [`OptExpression`], with the inputs below the pattern left as opaque handles.
//! A pattern input is one of:
//!
//! * a leaf, which matches one operator and binds its inputs as handles,
//! * a nested pattern, matched input by input, and the operator must have that many inputs,
//! * an each-input pattern, applied to every input of an n-ary operator such as union.
//!
//! [`PushLimitIntoUnionRule`] looks one level into every union input:
//! ```no
//! static ref PUSH_LIMIT_INTO_UNION_PATTERN: Pattern = {
//!     pattern(is_limit_or_top_n)
//!       .pattern(|op| matches!(op, Logical(LogicalUnion(_))))
//!         .each(any)
//!       .finish()
//!     .finish()
//! };
//! ```
//!
//! The rule answers with a new [`OptExpression`] mixing new operators and handles it was given.
//! For [`MergeLimitRule`]:
//!```no
//! [ExprHandle(0) Limit(10)]                               [Operator Limit(5)]
//!              |                                                  |
//!              |                   MergeLimitRule                 |
//! [ExprHandle(1) Limit(5)]         -------->              [GroupHandle(2)]
//!              |
//!       [GroupHandle(2)]
//! ```
mod pattern;
pub use pattern::*;
mod opt_expr;
pub use opt_expr::*;
mod filter;
pub use filter::*;
mod limit;
pub use limit::*;
mod min_max;
pub use min_max::*;
mod outer_join;
pub use outer_join::*;
mod semi_join;
pub use semi_join::*;

use std::cmp::Reverse;
use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;
use enumset::EnumSetType;
use strum_macros::AsRefStr;

use crate::config::OptimizerConfig;
use crate::error::QuartziteResult;
use crate::optimizer::Optimizer;

pub type OptExprVec<O> = Vec<OptExpression<O>>;

pub struct RuleResult<O: Optimizer> {
    exprs: OptExprVec<O>,
}

impl<O: Optimizer> Default for RuleResult<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Optimizer> RuleResult<O> {
    pub fn new() -> Self {
        Self { exprs: vec![] }
    }

    pub fn add(&mut self, new_expr: OptExpression<O>) {
        self.exprs.push(new_expr);
    }

    pub fn results(self) -> impl Iterator<Item = OptExpression<O>> {
        self.exprs.into_iter()
    }
}

/// A rule should only focus on providing equivalent transformations of optimizer expressions.
///
/// A rule adds nothing to `result` when its preconditions don't hold, or when applying it again
/// wouldn't change the plan.
#[enum_dispatch(RuleImpl)]
pub trait Rule {
    /// Apply a rule to match sub plan.
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> QuartziteResult<()>;

    /// Pattern for rule.
    fn pattern(&self) -> &Pattern;

    /// Use to identify each rule.
    fn rule_id(&self) -> RuleId;

    /// Use to identify applying order of rules.
    fn rule_promise(&self) -> RulePromise;
}

#[enum_dispatch]
#[derive(Clone, AsRefStr)]
pub enum RuleImpl {
    SimplifyOuterJoinRule,
    PushFilterIntoJoinRule,
    MergeFiltersRule,
    MergeFilterIntoScanRule,
    SemiJoinToInnerJoinRule,
    MinMaxEliminationRule,
    MergeLimitRule,
    LimitSortToTopNRule,
    PushLimitOverProjectionRule,
    PushLimitThroughOuterJoinRule,
    PushLimitIntoUnionRule,
    PushLimitToScanRule,
}

#[derive(EnumSetType, Debug)]
pub enum RuleId {
    SimplifyOuterJoin,
    PushFilterIntoJoin,
    MergeFilters,
    MergeFilterIntoScan,
    SemiJoinToInnerJoin,
    MinMaxElimination,
    MergeLimit,
    LimitSortToTopN,
    PushLimitOverProjection,
    PushLimitThroughOuterJoin,
    PushLimitIntoUnion,
    PushLimitToScan,
}

/// Rules with higher promise are tried first on each expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RulePromise {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Debug for RuleImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_ref())
    }
}

/// Rewrite rules enabled by `config`, ordered by promise.
pub fn rule_set(config: &OptimizerConfig) -> Vec<RuleImpl> {
    let mut rules: Vec<RuleImpl> = vec![
        MergeFiltersRule::new().into(),
        MergeFilterIntoScanRule::new().into(),
        PushFilterIntoJoinRule::new().into(),
        MergeLimitRule::new().into(),
        LimitSortToTopNRule::new().into(),
    ];

    if config.enable_outer_join_simplification {
        rules.push(SimplifyOuterJoinRule::new().into());
    }
    if config.enable_semi_join_rewrite {
        rules.push(SemiJoinToInnerJoinRule::new().into());
    }
    if config.enable_min_max_elimination {
        rules.push(MinMaxEliminationRule::new().into());
    }
    if config.enable_topn_pushdown {
        rules.push(PushLimitOverProjectionRule::new().into());
        rules.push(PushLimitThroughOuterJoinRule::new().into());
        rules.push(PushLimitIntoUnionRule::new().into());
        rules.push(PushLimitToScanRule::new().into());
    }

    rules.sort_by_key(|r| Reverse(r.rule_promise()));
    rules
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use crate::config::OptimizerConfig;
    use crate::rules::{rule_set, Rule, RuleId, RulePromise};

    #[test]
    fn test_rule_set_follows_config() {
        let config = OptimizerConfig {
            enable_min_max_elimination: false,
            enable_topn_pushdown: false,
            ..Default::default()
        };

        let ids: EnumSet<RuleId> = rule_set(&config).iter().map(|r| r.rule_id()).collect();
        assert!(ids.contains(RuleId::SimplifyOuterJoin));
        assert!(ids.contains(RuleId::MergeLimit));
        assert!(!ids.contains(RuleId::MinMaxElimination));
        assert!(!ids.contains(RuleId::PushLimitToScan));
    }

    #[test]
    fn test_rule_set_sorted_by_promise() {
        let rules = rule_set(&OptimizerConfig::default());
        let promises: Vec<RulePromise> = rules.iter().map(|r| r.rule_promise()).collect();
        let mut sorted = promises.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sorted, promises);
        assert_eq!("SimplifyOuterJoinRule", rules[0].as_ref());
    }
}
