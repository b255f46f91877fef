//! Defines cost model.

use std::fmt::{Display, Formatter};

use derive_more::{Add, AddAssign, Sub, SubAssign, Sum};

use crate::config::CostFactors;

pub const INF: Cost = Cost(f64::INFINITY);

#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Add, Sub, Sum, AddAssign, SubAssign)]
pub struct Cost(f64);

impl From<f64> for Cost {
    fn from(c: f64) -> Self {
        Cost(c)
    }
}

impl Cost {
    pub fn zero() -> Self {
        Cost(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn scale(self, factor: f64) -> Self {
        Cost(self.0 * factor)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Per operator cost formulas. Every method estimates the cost of the operator itself, without
/// accumulating children's cost.
pub struct CostModel<'a> {
    factors: &'a CostFactors,
}

impl<'a> CostModel<'a> {
    pub fn new(factors: &'a CostFactors) -> Self {
        Self { factors }
    }

    fn scan_factor(&self, desc: bool) -> f64 {
        if desc {
            self.factors.desc_scan_factor
        } else {
            self.factors.scan_factor
        }
    }

    /// Reads `rows` entries from `ranges` key ranges of a table or an index.
    pub fn scan(&self, rows: f64, ranges: usize, desc: bool) -> Cost {
        Cost(ranges.max(1) as f64 * self.factors.seek_factor + rows * self.scan_factor(desc))
    }

    /// Fetches `rows` rows from base table by handle after an index scan.
    pub fn double_read(&self, rows: f64) -> Cost {
        Cost(rows * self.factors.double_read_factor)
    }

    /// Evaluates a predicate or projection on each input row.
    pub fn cpu(&self, rows: f64) -> Cost {
        Cost(rows * self.factors.cpu_factor)
    }

    pub fn sort(&self, rows: f64) -> Cost {
        let rows = rows.max(1.0);
        Cost(rows * rows.log2().max(1.0) * self.factors.cpu_factor + rows * self.factors.memory_factor)
    }

    /// Keeps `n` smallest rows in a heap.
    pub fn top_n(&self, rows: f64, n: usize) -> Cost {
        let heap = (n.max(1) as f64 + 1.0).log2().max(1.0);
        Cost(rows * heap * self.factors.cpu_factor + n as f64 * self.factors.memory_factor)
    }

    pub fn hash_join(&self, build_rows: f64, probe_rows: f64) -> Cost {
        Cost(
            build_rows * (self.factors.hash_build_factor + self.factors.memory_factor)
                + probe_rows * self.factors.cpu_factor,
        )
    }

    pub fn merge_join(&self, left_rows: f64, right_rows: f64) -> Cost {
        Cost((left_rows + right_rows) * self.factors.cpu_factor)
    }

    /// Probes inner index once per outer row, each probe reading `rows_per_probe` entries.
    pub fn index_join(&self, outer_rows: f64, rows_per_probe: f64, double_read: bool) -> Cost {
        let mut per_probe = self.factors.seek_factor + rows_per_probe * self.factors.scan_factor;
        if double_read {
            per_probe += rows_per_probe * self.factors.double_read_factor;
        }
        Cost(outer_rows * per_probe)
    }

    pub fn hash_agg(&self, rows: f64, groups: f64) -> Cost {
        Cost(
            rows * (self.factors.cpu_factor + self.factors.hash_build_factor)
                + groups * self.factors.memory_factor,
        )
    }

    pub fn stream_agg(&self, rows: f64) -> Cost {
        Cost(rows * self.factors.cpu_factor)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CostFactors;
    use crate::cost::{Cost, CostModel, INF};

    #[test]
    fn test_cost_arithmetic() {
        let total: Cost = vec![Cost::from(1.0), Cost::from(2.5)].into_iter().sum();
        assert_eq!(Cost::from(3.5), total);
        assert!(total < INF);
        assert_eq!("3.50", total.to_string());
    }

    #[test]
    fn test_stream_agg_cheaper_on_ordered_input() {
        let factors = CostFactors::default();
        let model = CostModel::new(&factors);
        assert!(model.stream_agg(1000.0) < model.hash_agg(1000.0, 10.0));
        assert!(model.stream_agg(1000.0) + model.sort(1000.0) > model.hash_agg(1000.0, 10.0));
    }

    #[test]
    fn test_desc_scan_costs_more() {
        let factors = CostFactors::default();
        let model = CostModel::new(&factors);
        assert!(model.scan(100.0, 1, false) < model.scan(100.0, 1, true));
    }
}
