//! Optimizer configuration.

use serde::Deserialize;

use crate::error::QuartziteResult;

/// Tunables of one planning call.
///
/// Enumeration limits keep worst-case planning latency bounded: once a limit is hit, the
/// optimizer degrades to a wider (but still correct) plan instead of enumerating further.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Max number of point ranges produced by cartesian product of equality/IN lists.
    pub max_in_list_product: usize,
    /// Max number of ranges of one access path after union of disjuncts.
    pub max_ranges: usize,
    /// Max iterations of the fixed point rewrite driver.
    pub max_rewrite_iterations: usize,
    /// Max number of leaves flattened into one join group.
    pub max_join_group_size: usize,

    pub enable_min_max_elimination: bool,
    pub enable_semi_join_rewrite: bool,
    pub enable_outer_join_simplification: bool,
    pub enable_topn_pushdown: bool,

    pub cost: CostFactors,
}

/// Per row/per operation cost factors.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CostFactors {
    pub cpu_factor: f64,
    pub scan_factor: f64,
    pub desc_scan_factor: f64,
    pub seek_factor: f64,
    /// Extra cost of fetching one row from base table after an index scan.
    pub double_read_factor: f64,
    pub memory_factor: f64,
    pub hash_build_factor: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_in_list_product: 1024,
            max_ranges: 4096,
            max_rewrite_iterations: 64,
            max_join_group_size: 8,
            enable_min_max_elimination: true,
            enable_semi_join_rewrite: true,
            enable_outer_join_simplification: true,
            enable_topn_pushdown: true,
            cost: CostFactors::default(),
        }
    }
}

impl Default for CostFactors {
    fn default() -> Self {
        Self {
            cpu_factor: 3.0,
            scan_factor: 1.5,
            desc_scan_factor: 3.0,
            seek_factor: 20.0,
            double_read_factor: 10.0,
            memory_factor: 0.001,
            hash_build_factor: 2.0,
        }
    }
}

impl OptimizerConfig {
    pub fn from_yaml_str(yaml: &str) -> QuartziteResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> QuartziteResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
