//! Statistics consumed as an opaque cost oracle.
//!
//! Collection and histograms live elsewhere, this module only reads a frozen snapshot. When no
//! statistics are known for a table the pseudo estimates below are used.

use std::collections::HashMap;

use crate::range::{Datum, Range};

/// Row count assumed for a table without statistics.
pub const PSEUDO_ROW_COUNT: f64 = 10000.0;
pub const PSEUDO_EQUAL_SELECTIVITY: f64 = 1.0 / 1000.0;
pub const PSEUDO_LESS_SELECTIVITY: f64 = 1.0 / 3.0;
pub const PSEUDO_BETWEEN_SELECTIVITY: f64 = 1.0 / 40.0;
/// Selectivity of a residual filter which can't be analyzed.
pub const SELECTION_FACTOR: f64 = 0.8;

/// Statistics of operator.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Statistics {
    /// Total number of row count.
    ///
    /// This maybe an estimated value.
    row_count: f64,
    /// Statistics of each column, keyed by column name.
    column_stats: HashMap<String, ColumnStatistics>,
}

/// Statistics of one column.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ColumnStatistics {
    /// Number of distinct value of a column.
    ndv: f64,
    null_count: f64,
}

impl ColumnStatistics {
    pub fn new(ndv: f64, null_count: f64) -> Self {
        Self { ndv, null_count }
    }

    pub fn ndv(&self) -> f64 {
        self.ndv
    }

    pub fn null_count(&self) -> f64 {
        self.null_count
    }
}

impl Statistics {
    pub fn new(row_count: f64) -> Self {
        Self {
            row_count,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column<S: Into<String>>(mut self, column: S, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(column.into(), stats);
        self
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.column_stats.get(name)
    }

    /// Selectivity of `column = const`.
    pub fn equal_selectivity(&self, column: &str) -> f64 {
        match self.column(column) {
            Some(c) if c.ndv >= 1.0 => 1.0 / c.ndv,
            _ => PSEUDO_EQUAL_SELECTIVITY,
        }
    }

    /// Selectivity of `column IS NULL`.
    pub fn null_selectivity(&self, column: &str) -> f64 {
        match self.column(column) {
            Some(c) if self.row_count > 0.0 => (c.null_count / self.row_count).min(1.0),
            _ => PSEUDO_EQUAL_SELECTIVITY,
        }
    }

    /// Estimated number of rows of a key range sequence over `columns`.
    ///
    /// `unique` tells that `columns` is the full key of a unique index, so a full width point
    /// without NULL matches at most one row. NULL keys are not unique.
    pub fn estimate_range_rows(&self, ranges: &[Range], columns: &[String], unique: bool) -> f64 {
        let rows: f64 = ranges
            .iter()
            .map(|r| {
                if unique
                    && r.is_point()
                    && r.point_prefix_len() >= columns.len()
                    && !r.low.contains(&Datum::Null)
                {
                    return 1.0;
                }
                self.row_count * self.range_selectivity(r, columns)
            })
            .sum();
        rows.min(self.row_count)
    }

    fn range_selectivity(&self, range: &Range, columns: &[String]) -> f64 {
        if range.is_full() {
            return 1.0;
        }
        let prefix = range.point_prefix_len();
        let mut selectivity = 1.0;
        for (idx, column) in columns.iter().enumerate().take(prefix) {
            selectivity *= match range.low[idx] {
                Datum::Null => self.null_selectivity(column),
                _ => self.equal_selectivity(column),
            };
        }

        if prefix < range.width() && prefix < columns.len() {
            let low_bounded = matches!(range.low[prefix], Datum::Value(_));
            let high_bounded = matches!(range.high[prefix], Datum::Value(_));
            selectivity *= match (low_bounded, high_bounded) {
                (true, true) => PSEUDO_BETWEEN_SELECTIVITY,
                (true, false) | (false, true) => PSEUDO_LESS_SELECTIVITY,
                // `IS NOT NULL` or unbounded.
                (false, false) => 1.0,
            };
        }
        selectivity
    }
}

/// Source of table statistics.
pub trait StatsProvider: Send + Sync {
    fn table_stats(&self, table: &str) -> Option<Statistics>;
}

/// Statistics held in memory, tables without an entry get pseudo statistics.
#[derive(Clone, Debug, Default)]
pub struct MemoryStatsProvider {
    tables: HashMap<String, Statistics>,
}

impl MemoryStatsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<S: Into<String>>(mut self, table: S, stats: Statistics) -> Self {
        self.tables.insert(table.into(), stats);
        self
    }
}

impl StatsProvider for MemoryStatsProvider {
    fn table_stats(&self, table: &str) -> Option<Statistics> {
        self.tables.get(table).cloned()
    }
}

/// Statistics of `table`, or pseudo statistics if the provider knows nothing.
pub fn table_stats_or_pseudo(provider: &dyn StatsProvider, table: &str) -> Statistics {
    provider
        .table_stats(table)
        .unwrap_or_else(|| Statistics::new(PSEUDO_ROW_COUNT))
}
