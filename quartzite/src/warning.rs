//! Non-fatal planning diagnostics.
//!
//! A warning never stops planning, every variant has a documented fallback applied by the code
//! which raises it.

use itertools::Itertools;
use log::warn;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    #[error("There are no matching table names for ({}) in optimizer hint /*+ {hint} */. Maybe you can use the table alias name", .tables.iter().join(", "))]
    UnmatchedHintTables { hint: String, tables: Vec<String> },
    #[error("Key '{index}' doesn't exist in table '{table}'")]
    IndexNotFound { table: String, index: String },
    #[error("Optimizer aggregation hints are conflicted in query block {block}")]
    ConflictingAggHints { block: String },
    #[error("Optimizer Hint /*+ {hint} */ is inapplicable for ({}): {reason}", .tables.iter().join(", "))]
    InapplicableJoinHint {
        hint: String,
        tables: Vec<String>,
        reason: String,
    },
    #[error("Query block name {name:?} is not found")]
    UnknownQueryBlock { name: String },
    #[error("Duplicate query block name {name:?}, only the first one is effective")]
    DuplicateQueryBlockName { name: String },
    #[error("Optimizer hint {name} is not supported")]
    UnsupportedHint { name: String },
    #[error("Optimizer hint syntax error at {text:?}")]
    HintSyntax { text: String },
}

/// Warnings collected during one planning call.
#[derive(Debug, Default, Clone)]
pub struct WarningCollector {
    warnings: Vec<PlanWarning>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `warning`. A warning equal to one already recorded is dropped, since the planner
    /// may visit one subtree under several requirements.
    pub fn push(&mut self, warning: PlanWarning) {
        if self.warnings.contains(&warning) {
            return;
        }
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_vec(self) -> Vec<PlanWarning> {
        self.warnings
    }
}
