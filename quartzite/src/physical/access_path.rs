use std::collections::HashSet;

use datafusion_common::Column;
use datafusion_expr::Expr;
use log::debug;
use prettytable::Table;
use strum_macros::AsRefStr;

use crate::catalog::{IndexColumn, IndexDescriptor, TableMeta};
use crate::config::OptimizerConfig;
use crate::cost::{Cost, CostModel};
use crate::error::QuartziteResult;
use crate::expr::exprs_columns;
use crate::hint::IndexHint;
use crate::operator::Scan;
use crate::properties::{OrderSpec, Ordering};
use crate::range::{Range, RangeBuilder, RangeColumn, RangeResult};
use crate::stat::{Statistics, SELECTION_FACTOR};

/// How a table is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr)]
pub enum AccessKind {
    /// Reads rows from table storage, ordered by the integer handle if there is one.
    TableScan,
    /// Reads an index which covers every needed column.
    IndexScan,
    /// Reads an index, then fetches rows from table storage by handle.
    IndexLookUp,
}

/// One candidate way to read a table, with ranges derived from the scan filters.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessPath {
    pub kind: AccessKind,
    /// `None` for table access.
    pub index: Option<IndexDescriptor>,
    /// Key columns whose order this path provides, in key order.
    pub key_columns: Vec<Column>,
    /// Normalized ranges, empty when no row can match.
    pub ranges: Vec<Range>,
    pub access_conditions: Vec<Expr>,
    pub residual_conditions: Vec<Expr>,
    /// Number of leading key columns constrained to a single point.
    pub eq_prefix_len: usize,
    /// Estimated rows read from the ranges.
    pub range_rows: f64,
    /// Estimated rows left after residual conditions.
    pub output_rows: f64,
    /// Scans ranges backward.
    pub desc: bool,
}

impl AccessPath {
    pub fn is_double_read(&self) -> bool {
        self.kind == AccessKind::IndexLookUp
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index.as_ref().map(|i| i.name.as_str())
    }

    /// Order of rows produced by this path.
    pub fn provided_order(&self) -> OrderSpec {
        OrderSpec::new(
            self.key_columns
                .iter()
                .map(|c| Ordering::new(c.clone(), !self.desc)),
        )
    }

    /// Scan direction producing `required`, `Some(desc)` if this path can produce it at all.
    ///
    /// With a single range, leading key columns fixed to a point don't affect the order, so the
    /// required columns may start after them.
    pub fn order_direction(&self, required: &OrderSpec) -> Option<bool> {
        if required.is_empty() {
            return Some(false);
        }
        let desc = !required.uniform_direction()?;
        let skippable = if self.ranges.len() <= 1 {
            self.eq_prefix_len
        } else {
            0
        };

        (0..=skippable.min(self.key_columns.len()))
            .any(|skip| {
                let keys = &self.key_columns[skip..];
                keys.len() >= required.orders().len()
                    && keys
                        .iter()
                        .zip(required.orders())
                        .all(|(key, o)| key == o.column())
            })
            .then_some(desc)
    }

    pub fn with_desc(mut self, desc: bool) -> Self {
        self.desc = desc;
        self
    }

    /// Cost of reading `rows_read` entries through this path.
    pub fn cost(&self, model: &CostModel, rows_read: f64) -> Cost {
        let mut cost = model.scan(rows_read, self.ranges.len(), self.desc);
        if self.is_double_read() {
            cost += model.double_read(rows_read);
        }
        if !self.residual_conditions.is_empty() {
            cost += model.cpu(rows_read);
        }
        cost
    }
}

/// Key columns of an index as range builder input.
///
/// Stops at the first column missing from the table schema.
pub fn index_range_columns(
    table: &TableMeta,
    scan: &Scan,
    columns: &[IndexColumn],
) -> Vec<RangeColumn> {
    columns
        .iter()
        .map_while(|ic| {
            table.data_type(&ic.name).map(|data_type| RangeColumn {
                column: scan.column(&ic.name),
                data_type: data_type.clone(),
                nullable: table.is_nullable(&ic.name),
                prefix_len: ic.prefix_len,
            })
        })
        .collect()
}

/// Enumerates access paths of one table: the table itself and each of its indexes.
pub struct AccessPathEnumerator<'a> {
    range_builder: RangeBuilder,
    table: &'a TableMeta,
    stats: &'a Statistics,
}

impl<'a> AccessPathEnumerator<'a> {
    pub fn new(config: &OptimizerConfig, table: &'a TableMeta, stats: &'a Statistics) -> Self {
        Self {
            range_builder: RangeBuilder::new(config),
            table,
            stats,
        }
    }

    /// Paths surviving `hint`. `needed` holds names of columns read by the rest of the plan.
    ///
    /// The table path is kept when a hint filters out every path.
    pub fn enumerate(
        &self,
        scan: &Scan,
        needed: &HashSet<String>,
        hint: Option<&IndexHint>,
    ) -> QuartziteResult<Vec<AccessPath>> {
        let mut needed = needed.clone();
        needed.extend(
            exprs_columns(scan.filters())?
                .into_iter()
                .map(|c| c.name),
        );

        let table_path = self.table_path(scan);
        let mut paths: Vec<AccessPath> = self
            .table
            .indexes()
            .iter()
            .filter(|index| hint.map(|h| h.allows(Some(&index.name))).unwrap_or(true))
            .map(|index| self.index_path(scan, index, &needed))
            .collect();

        if hint.map(|h| h.allows(None)).unwrap_or(true) || paths.is_empty() {
            paths.insert(0, table_path);
        }

        debug!(
            "Access paths of {}:\n{}",
            scan.visible_name(),
            candidates_table(&paths)
        );
        Ok(paths)
    }

    fn table_path(&self, scan: &Scan) -> AccessPath {
        let handle: Vec<IndexColumn> = self
            .table
            .handle()
            .map(IndexColumn::new)
            .into_iter()
            .collect();
        let range_columns = index_range_columns(self.table, scan, &handle);
        let result = self.range_builder.build(scan.filters(), &range_columns);
        let key_columns = range_columns.iter().map(|c| c.column.clone()).collect();
        self.new_path(AccessKind::TableScan, None, &handle, key_columns, result, true)
    }

    fn index_path(
        &self,
        scan: &Scan,
        index: &IndexDescriptor,
        needed: &HashSet<String>,
    ) -> AccessPath {
        let range_columns = index_range_columns(self.table, scan, &index.columns);
        let result = self.range_builder.build(scan.filters(), &range_columns);
        // A prefix column stores truncated values, so it orders neither itself nor what follows.
        let key_columns = range_columns
            .iter()
            .take_while(|c| c.prefix_len.is_none())
            .map(|c| c.column.clone())
            .collect();

        let kind = if index.covers(needed, self.table.handle()) {
            AccessKind::IndexScan
        } else {
            AccessKind::IndexLookUp
        };
        self.new_path(
            kind,
            Some(index.clone()),
            &index.columns,
            key_columns,
            result,
            index.unique,
        )
    }

    fn new_path(
        &self,
        kind: AccessKind,
        index: Option<IndexDescriptor>,
        columns: &[IndexColumn],
        key_columns: Vec<Column>,
        result: RangeResult,
        unique: bool,
    ) -> AccessPath {
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let range_rows = self
            .stats
            .estimate_range_rows(&result.ranges, &names, unique);
        let output_rows = if result.residual_conditions.is_empty() {
            range_rows
        } else {
            range_rows * SELECTION_FACTOR
        };

        AccessPath {
            kind,
            index,
            key_columns,
            ranges: result.ranges,
            access_conditions: result.access_conditions,
            residual_conditions: result.residual_conditions,
            eq_prefix_len: result.eq_prefix_len,
            range_rows,
            output_rows,
            desc: false,
        }
    }
}

/// Tabular dump of access path candidates for debug logging.
pub fn candidates_table(paths: &[AccessPath]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Access", "Index", "Ranges", "Residual", "Range Rows", "Output Rows"]);
    for path in paths {
        table.add_row(row![
            path.kind.as_ref(),
            path.index_name().unwrap_or("-"),
            path.ranges.len(),
            path.residual_conditions.len(),
            format!("{:.2}", path.range_rows),
            format!("{:.2}", path.output_rows)
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use datafusion_expr::{col, lit};

    use crate::catalog::Catalog;
    use crate::config::OptimizerConfig;
    use crate::hint::IndexHint;
    use crate::operator::Scan;
    use crate::physical::{candidates_table, AccessKind, AccessPath, AccessPathEnumerator};
    use crate::properties::{OrderSpec, Ordering};
    use crate::stat::table_stats_or_pseudo;
    use crate::test_utils::{column, test_catalog, test_stats};

    fn enumerate(scan: Scan, needed: &[&str], hint: Option<&IndexHint>) -> Vec<AccessPath> {
        let catalog = test_catalog();
        let table = catalog.table(scan.table_name()).unwrap();
        let stats = table_stats_or_pseudo(&test_stats(), scan.table_name());
        let config = OptimizerConfig::default();
        let needed = needed.iter().map(|s| s.to_string()).collect();
        AccessPathEnumerator::new(&config, &table, &stats)
            .enumerate(&scan, &needed, hint)
            .unwrap()
    }

    fn find<'a>(paths: &'a [AccessPath], index: Option<&str>) -> &'a AccessPath {
        paths.iter().find(|p| p.index_name() == index).unwrap()
    }

    #[test]
    fn test_enumerate_paths() {
        let scan = Scan::new("t", 1).with_filters(vec![col("t.a").eq(lit(5i64))]);
        let paths = enumerate(scan, &["a", "id"], None);

        assert_eq!(3, paths.len());
        let table = find(&paths, None);
        assert_eq!(AccessKind::TableScan, table.kind);
        assert_eq!(1, table.residual_conditions.len());
        assert_eq!(8000.0, table.output_rows);

        let idx_a = find(&paths, Some("idx_a"));
        assert_eq!(AccessKind::IndexScan, idx_a.kind);
        assert!(idx_a.residual_conditions.is_empty());
        assert_eq!(1, idx_a.eq_prefix_len);
        assert_eq!(10.0, idx_a.range_rows);

        let idx_bc = find(&paths, Some("idx_bc"));
        assert_eq!(AccessKind::IndexLookUp, idx_bc.kind);
        assert!(idx_bc.is_double_read());
    }

    #[test]
    fn test_hint_filtering() {
        let hint = IndexHint {
            use_list: Some(vec!["idx_a".to_string(), "idx_bc".to_string()]),
            ignore_list: vec!["idx_a".to_string()],
        };
        let paths = enumerate(Scan::new("t", 1), &["a"], Some(&hint));
        let names: Vec<Option<&str>> = paths.iter().map(|p| p.index_name()).collect();
        assert_eq!(vec![Some("idx_bc")], names);

        let ignore_all = IndexHint {
            use_list: Some(vec!["idx_a".to_string()]),
            ignore_list: vec!["idx_a".to_string()],
        };
        let paths = enumerate(Scan::new("t", 1), &["a"], Some(&ignore_all));
        assert_eq!(1, paths.len());
        assert_eq!(AccessKind::TableScan, paths[0].kind);
    }

    #[test]
    fn test_order_direction() {
        let scan = Scan::new("t", 1).with_filters(vec![col("t.b").eq(lit(1i64))]);
        let paths = enumerate(scan, &["b", "c"], None);
        let idx_bc = find(&paths, Some("idx_bc"));

        let by_c = OrderSpec::new(vec![Ordering::desc(column("t.c"))]);
        assert_eq!(Some(true), idx_bc.order_direction(&by_c));
        let by_bc = OrderSpec::new(vec![Ordering::asc(column("t.b")), Ordering::asc(column("t.c"))]);
        assert_eq!(Some(false), idx_bc.order_direction(&by_bc));
        let mixed = OrderSpec::new(vec![Ordering::asc(column("t.b")), Ordering::desc(column("t.c"))]);
        assert_eq!(None, idx_bc.order_direction(&mixed));

        let table = find(&paths, None);
        assert_eq!(
            Some(false),
            table.order_direction(&OrderSpec::new(vec![Ordering::asc(column("t.id"))]))
        );
        assert_eq!(None, table.order_direction(&by_c));
    }

    #[test]
    fn test_contradiction_yields_empty_ranges() {
        let scan = Scan::new("t", 1).with_filters(vec![col("t.id").is_null()]);
        let paths = enumerate(scan, &["id"], None);
        assert!(find(&paths, None).is_empty());
        assert_eq!(0.0, find(&paths, None).output_rows);
    }

    #[test]
    fn test_candidates_table() {
        let paths = enumerate(Scan::new("t3", 1), &["a"], None);
        assert_eq!(1, paths.len());
        assert!(paths[0].key_columns.is_empty());
        let dump = candidates_table(&paths).to_string();
        assert!(dump.contains("TableScan"));
        assert!(dump.contains("Output Rows"));
    }
}
