use arrow_schema::DataType;
use datafusion_common::Column;
use datafusion_expr::JoinType;
use log::debug;

use crate::catalog::{IndexColumn, IndexDescriptor};
use crate::cost::Cost;
use crate::error::{PlanningError, QuartziteResult};
use crate::expr::{exprs_columns, split_conjunction};
use crate::hint::JoinMethod;
use crate::operator::LogicalOperator::{
    LogicalFilter, LogicalLimit, LogicalProjection, LogicalScan, LogicalSort, LogicalTopN,
};
use crate::operator::Operator::Logical;
use crate::operator::PhysicalOperator::{
    PhysicalHashJoin, PhysicalIndexNestedLoopJoin, PhysicalSortMergeJoin, PhysicalTableReader,
};
use crate::operator::{
    HashJoin, IndexNestedLoopJoin, Join, JoinCondition, JoinSide, Scan, SortMergeJoin,
    TableReader,
};
use crate::physical::planner::input;
use crate::physical::{AccessKind, AccessPath, Candidate, PhysicalPlanner, PhysicalRequirement};
use crate::plan::{PlanNodeRef, Visitor};
use crate::properties::{OrderSpec, Ordering};
use crate::range::Range;
use crate::stat::{table_stats_or_pseudo, SELECTION_FACTOR};
use crate::warning::PlanWarning;

/// Sides an index nested loop join may probe through an index.
fn probe_sides(join_type: JoinType) -> &'static [JoinSide] {
    match join_type {
        JoinType::Inner => &[JoinSide::Right, JoinSide::Left],
        JoinType::Left | JoinType::LeftSemi | JoinType::LeftAnti => &[JoinSide::Right],
        JoinType::Right | JoinType::RightSemi | JoinType::RightAnti => &[JoinSide::Left],
        JoinType::Full => &[],
    }
}

/// Sides a hash join may build its hash table on.
fn build_sides(join_type: JoinType) -> &'static [JoinSide] {
    match join_type {
        JoinType::Inner | JoinType::Left | JoinType::Right | JoinType::Full => {
            &[JoinSide::Left, JoinSide::Right]
        }
        JoinType::LeftSemi | JoinType::LeftAnti => &[JoinSide::Right],
        JoinType::RightSemi | JoinType::RightAnti => &[JoinSide::Left],
    }
}

fn join_rows(join: &Join, left_rows: f64, right_rows: f64) -> f64 {
    let rows = match join.join_type() {
        JoinType::LeftSemi | JoinType::LeftAnti => left_rows * SELECTION_FACTOR,
        JoinType::RightSemi | JoinType::RightAnti => right_rows * SELECTION_FACTOR,
        join_type => {
            let matched = if join.on().is_empty() {
                left_rows * right_rows
            } else {
                left_rows.max(right_rows)
            };
            match join_type {
                JoinType::Left => matched.max(left_rows),
                JoinType::Right => matched.max(right_rows),
                JoinType::Full => matched.max(left_rows + right_rows),
                _ => matched,
            }
        }
    };
    if join.filter().is_some() {
        rows * SELECTION_FACTOR
    } else {
        rows
    }
}

fn is_orderable(data_type: &DataType) -> bool {
    !matches!(
        data_type,
        DataType::List(_)
            | DataType::LargeList(_)
            | DataType::FixedSizeList(_, _)
            | DataType::Struct(_)
            | DataType::Map(_, _)
            | DataType::Union(_, _)
    )
}

/// Lowercase visible name of the only table under `node`, looking through unary operators which
/// keep the table's identity.
pub(super) fn single_table(node: &PlanNodeRef) -> Option<String> {
    match node.operator() {
        Logical(LogicalScan(scan)) => Some(scan.visible_name().to_ascii_lowercase()),
        Logical(
            LogicalFilter(_)
            | LogicalProjection(_)
            | LogicalSort(_)
            | LogicalLimit(_)
            | LogicalTopN(_),
        ) => single_table(node.inputs().first()?),
        _ => None,
    }
}

/// A join hint naming at least one side of the join being planned.
struct MatchedHint {
    method: JoinMethod,
    sides: Vec<JoinSide>,
    text: String,
    tables: Vec<String>,
}

impl MatchedHint {
    /// Lower is tried first.
    fn priority(&self) -> u8 {
        match self.method {
            JoinMethod::IndexNestedLoop => 0,
            JoinMethod::SortMerge => 1,
            JoinMethod::HashBuild | JoinMethod::HashProbe => 2,
            JoinMethod::Hash => 3,
        }
    }
}

/// Index probed by an index nested loop join.
struct LookupPath {
    path: AccessPath,
    lookup_keys: Vec<Column>,
    rows_per_probe: f64,
    /// Estimated rows of the inner table after its filters.
    table_rows: f64,
}

impl<'a> PhysicalPlanner<'a> {
    pub(super) fn plan_join(
        &mut self,
        node: &PlanNodeRef,
        join: &Join,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        self.check_join_keys(node, join)?;

        let mut hinted = self.matched_hints(node, join);
        hinted.sort_by_key(|h| h.priority());
        for hint in &hinted {
            let candidates = self.hinted_candidates(node, join, hint, required)?;
            if !candidates.is_empty() {
                debug!("Join node {} planned by hint {}", node.id(), hint.text);
                return Ok(candidates);
            }
        }

        let mut candidates = vec![self.hash_join_candidate(node, join, None)?];
        if !join.on().is_empty() {
            candidates.push(self.merge_join_candidate(node, join)?);
        }
        for inner in probe_sides(join.join_type()) {
            if let Some(candidate) = self.index_join_candidate(node, join, *inner, required)? {
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    fn check_join_keys(&self, node: &PlanNodeRef, join: &Join) -> QuartziteResult<()> {
        let left = input(node, 0)?;
        let right = input(node, 1)?;
        let left_schema = self.logical_prop(&left)?.schema();
        let right_schema = self.logical_prop(&right)?.schema();

        for (l, r) in join.on() {
            for (column, schema) in [(l, left_schema), (r, right_schema)] {
                let field = schema
                    .field_from_column(column)
                    .map_err(|_| PlanningError::UnknownColumn(column.clone()))?;
                if !is_orderable(field.data_type()) {
                    return Err(PlanningError::UnorderableJoinKey(column.clone()).into());
                }
            }
        }
        Ok(())
    }

    fn matched_hints(&mut self, node: &PlanNodeRef, join: &Join) -> Vec<MatchedHint> {
        let names: Vec<Option<String>> = node.inputs().iter().map(single_table).collect();
        let hints = self.hints;

        let mut matched = vec![];
        for (idx, hint) in hints.join_hints(join.block()).iter().enumerate() {
            let sides: Vec<JoinSide> = [JoinSide::Left, JoinSide::Right]
                .into_iter()
                .filter(|side| {
                    names
                        .get(side.index())
                        .and_then(|n| n.as_ref())
                        .map(|n| hint.tables.contains(n))
                        .unwrap_or(false)
                })
                .collect();
            if sides.is_empty() {
                continue;
            }

            self.matched_join_hints.insert((join.block(), idx));
            matched.push(MatchedHint {
                method: hint.method,
                sides,
                text: hint.text.clone(),
                tables: hint.tables.clone(),
            });
        }
        matched
    }

    /// Candidates honoring `hint`, empty with a warning when it can't be honored.
    fn hinted_candidates(
        &mut self,
        node: &PlanNodeRef,
        join: &Join,
        hint: &MatchedHint,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        let join_type = join.join_type();
        let mut candidates = vec![];
        let reason = match hint.method {
            // The named table drives the join, the other side is probed.
            JoinMethod::IndexNestedLoop => {
                let inners: Vec<JoinSide> = hint
                    .sides
                    .iter()
                    .map(|s| s.other())
                    .filter(|inner| probe_sides(join_type).contains(inner))
                    .collect();
                for inner in &inners {
                    if let Some(c) = self.index_join_candidate(node, join, *inner, required)? {
                        candidates.push(c);
                    }
                }
                if inners.is_empty() {
                    format!("{:?} join can't drive an index lookup from this side", join_type)
                } else {
                    "no index of the inner side starts with a join key".to_string()
                }
            }
            JoinMethod::SortMerge => {
                if !join.on().is_empty() {
                    candidates.push(self.merge_join_candidate(node, join)?);
                }
                "no equality join condition".to_string()
            }
            JoinMethod::Hash => {
                candidates.push(self.hash_join_candidate(node, join, None)?);
                String::new()
            }
            JoinMethod::HashBuild | JoinMethod::HashProbe => {
                let builds: Vec<JoinSide> = hint
                    .sides
                    .iter()
                    .map(|s| {
                        if hint.method == JoinMethod::HashBuild {
                            *s
                        } else {
                            s.other()
                        }
                    })
                    .filter(|s| build_sides(join_type).contains(s))
                    .collect();
                for build in builds {
                    candidates.push(self.hash_join_candidate(node, join, Some(build))?);
                }
                format!("{:?} join can't build hash table on this side", join_type)
            }
        };

        if candidates.is_empty() {
            self.warnings.push(PlanWarning::InapplicableJoinHint {
                hint: hint.text.clone(),
                tables: hint.tables.clone(),
                reason,
            });
        }
        Ok(candidates)
    }

    fn hash_join_candidate(
        &mut self,
        node: &PlanNodeRef,
        join: &Join,
        build: Option<JoinSide>,
    ) -> QuartziteResult<Candidate> {
        let left = self.visit(PhysicalRequirement::default(), input(node, 0)?)?;
        let right = self.visit(PhysicalRequirement::default(), input(node, 1)?)?;

        let build = build.unwrap_or_else(|| {
            let sides = build_sides(join.join_type());
            if sides.len() == 1 {
                sides[0]
            } else if left.rows < right.rows {
                JoinSide::Left
            } else {
                JoinSide::Right
            }
        });
        let (build_rows, probe_rows) = match build {
            JoinSide::Left => (left.rows, right.rows),
            JoinSide::Right => (right.rows, left.rows),
        };

        let cost = self.cost_model.hash_join(build_rows, probe_rows);
        let rows = join_rows(join, left.rows, right.rows);
        Ok(self.build_candidate(
            node,
            PhysicalHashJoin(HashJoin::new(JoinCondition::from(join), build)),
            &[&left, &right],
            cost,
            rows,
            OrderSpec::default(),
        ))
    }

    /// Merge join over inputs sorted ascending on the join keys.
    fn merge_join_candidate(
        &mut self,
        node: &PlanNodeRef,
        join: &Join,
    ) -> QuartziteResult<Candidate> {
        let left_order = OrderSpec::new(join.on().iter().map(|(l, _)| Ordering::asc(l.clone())));
        let right_order = OrderSpec::new(join.on().iter().map(|(_, r)| Ordering::asc(r.clone())));
        let left = self.visit(
            PhysicalRequirement::ordered(left_order.clone()),
            input(node, 0)?,
        )?;
        let right = self.visit(
            PhysicalRequirement::ordered(right_order.clone()),
            input(node, 1)?,
        )?;

        let order = match join.join_type() {
            JoinType::Inner | JoinType::Left | JoinType::LeftSemi | JoinType::LeftAnti => {
                left_order
            }
            JoinType::Right | JoinType::RightSemi | JoinType::RightAnti => right_order,
            JoinType::Full => OrderSpec::default(),
        };
        let cost = self.cost_model.merge_join(left.rows, right.rows);
        let rows = join_rows(join, left.rows, right.rows);
        Ok(self.build_candidate(
            node,
            PhysicalSortMergeJoin(SortMergeJoin::new(JoinCondition::from(join))),
            &[&left, &right],
            cost,
            rows,
            order,
        ))
    }

    /// Index nested loop join probing `inner`, `None` if it has no usable index.
    ///
    /// The inner side must be a plain table read whose index or handle starts with a join key.
    fn index_join_candidate(
        &mut self,
        node: &PlanNodeRef,
        join: &Join,
        inner: JoinSide,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Option<Candidate>> {
        if join.on().is_empty() {
            return Ok(None);
        }
        let inner_node = input(node, inner.index())?;
        let scan = match inner_node.operator() {
            Logical(LogicalScan(scan)) if scan.pushed().is_none() => scan.clone(),
            _ => return Ok(None),
        };
        let inner_keys: Vec<Column> = join
            .on()
            .iter()
            .map(|(l, r)| match inner {
                JoinSide::Left => l.clone(),
                JoinSide::Right => r.clone(),
            })
            .collect();
        let lookup = match self.lookup_path(&scan, &inner_keys)? {
            Some(lookup) => lookup,
            None => return Ok(None),
        };

        let outer_node = input(node, inner.other().index())?;
        let outer_prop = self.logical_prop(&outer_node)?;
        let outer_order = if required.order.columns().all(|c| outer_prop.contains_column(c)) {
            required.order.clone()
        } else {
            OrderSpec::default()
        };
        let outer = self.visit(PhysicalRequirement::ordered(outer_order), outer_node)?;

        let double_read = lookup.path.is_double_read();
        let has_residual = !lookup.path.residual_conditions.is_empty();
        let mut cost = self
            .cost_model
            .index_join(outer.rows, lookup.rows_per_probe, double_read);
        if has_residual {
            cost += self.cost_model.cpu(outer.rows * lookup.rows_per_probe);
        }

        let reader = TableReader::new(&scan, lookup.path);
        let inner_candidate = self.build_candidate(
            &inner_node,
            PhysicalTableReader(reader),
            &[],
            Cost::zero(),
            lookup.rows_per_probe,
            OrderSpec::default(),
        );

        let (left, right, left_rows, right_rows) = match inner {
            JoinSide::Left => (&inner_candidate, &outer, lookup.table_rows, outer.rows),
            JoinSide::Right => (&outer, &inner_candidate, outer.rows, lookup.table_rows),
        };
        let rows = join_rows(join, left_rows, right_rows);
        let order = outer.order.clone();
        let operator = PhysicalIndexNestedLoopJoin(IndexNestedLoopJoin::new(
            JoinCondition::from(join),
            inner,
            lookup.lookup_keys,
        ));
        Ok(Some(self.build_candidate(
            node,
            operator,
            &[left, right],
            cost,
            rows,
            order,
        )))
    }

    /// Cheapest index of `scan` whose leading columns are bound by `keys`.
    fn lookup_path(&self, scan: &Scan, keys: &[Column]) -> QuartziteResult<Option<LookupPath>> {
        let table = self
            .context
            .catalog
            .table(scan.table_name())
            .ok_or_else(|| PlanningError::UnknownTable(scan.table_name().to_string()))?;
        let stats = table_stats_or_pseudo(self.context.stats.as_ref(), scan.table_name());
        let hint = self.hints.index_hint(scan.block(), scan.visible_name());

        let mut needed = self.needed_of_scan(scan, &table);
        needed.extend(exprs_columns(scan.filters())?.into_iter().map(|c| c.name));
        let residual_conditions: Vec<_> = scan
            .filters()
            .iter()
            .flat_map(split_conjunction)
            .cloned()
            .collect();
        let table_rows = if residual_conditions.is_empty() {
            stats.row_count()
        } else {
            stats.row_count() * SELECTION_FACTOR
        };

        let mut options: Vec<(Option<&IndexDescriptor>, Vec<IndexColumn>, bool)> = vec![];
        if let Some(handle) = table.handle() {
            if hint.map(|h| h.allows(None)).unwrap_or(true) {
                options.push((None, vec![IndexColumn::new(handle)], true));
            }
        }
        for index in table.indexes() {
            if hint.map(|h| h.allows(Some(&index.name))).unwrap_or(true) {
                options.push((Some(index), index.columns.clone(), index.unique));
            }
        }

        let mut best: Option<LookupPath> = None;
        for (index, columns, unique) in options {
            let lookup_keys: Vec<Column> = columns
                .iter()
                .map(|c| scan.column(&c.name))
                .take_while(|c| keys.contains(c))
                .collect();
            if lookup_keys.is_empty() {
                continue;
            }

            let rows_per_probe = if unique && lookup_keys.len() == columns.len() {
                1.0
            } else {
                lookup_keys
                    .iter()
                    .map(|c| stats.equal_selectivity(&c.name))
                    .product::<f64>()
                    * stats.row_count()
            };
            let kind = match index {
                None => AccessKind::TableScan,
                Some(index) if index.covers(&needed, table.handle()) => AccessKind::IndexScan,
                Some(_) => AccessKind::IndexLookUp,
            };
            let output_rows = if residual_conditions.is_empty() {
                rows_per_probe
            } else {
                rows_per_probe * SELECTION_FACTOR
            };
            let path = AccessPath {
                kind,
                index: index.cloned(),
                key_columns: lookup_keys.clone(),
                ranges: vec![Range::full()],
                access_conditions: vec![],
                residual_conditions: residual_conditions.clone(),
                eq_prefix_len: lookup_keys.len(),
                range_rows: rows_per_probe,
                output_rows,
                desc: false,
            };

            let better = match &best {
                None => true,
                Some(b) => {
                    (rows_per_probe, path.is_double_read())
                        < (b.rows_per_probe, b.path.is_double_read())
                }
            };
            if better {
                best = Some(LookupPath {
                    path,
                    lookup_keys,
                    rows_per_probe,
                    table_rows,
                });
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use datafusion_expr::{col, JoinType};

    use crate::hint::{HintComment, HintResolver, QueryBlocks};
    use crate::operator::JoinSide;
    use crate::physical::join::{build_sides, probe_sides, single_table};
    use crate::physical::PhysicalPlanner;
    use crate::plan::explain::explain_to_string;
    use crate::plan::{LogicalPlanBuilder, Plan};
    use crate::test_utils::{column, test_context};
    use crate::warning::{PlanWarning, WarningCollector};

    fn plan_join(join_type: JoinType, hints: &str) -> (String, Vec<PlanWarning>) {
        let right = LogicalPlanBuilder::new().scan("t2", 1).build().unwrap();
        let plan = LogicalPlanBuilder::new()
            .scan("t1", 1)
            .join(join_type, vec![(column("t1.a"), column("t2.b"))], right)
            .projection(vec![col("t1.a")])
            .build()
            .unwrap();
        plan_physical(plan, hints)
    }

    fn plan_physical(plan: Plan, hints: &str) -> (String, Vec<PlanWarning>) {
        let context = test_context();
        let mut warnings = WarningCollector::new();
        let blocks = QueryBlocks::from_plan(&plan);
        let comments = if hints.is_empty() {
            vec![]
        } else {
            vec![HintComment::text(1, hints)]
        };
        let resolved =
            HintResolver::new(&blocks, context.catalog.as_ref()).resolve(&comments, &mut warnings);
        let physical = PhysicalPlanner::new(&context, &resolved, &mut warnings)
            .plan(&plan)
            .unwrap();
        (explain_to_string(&physical).unwrap(), warnings.into_vec())
    }

    #[test]
    fn test_join_side_rules() {
        assert_eq!(&[JoinSide::Right], probe_sides(JoinType::Left));
        assert!(probe_sides(JoinType::Full).is_empty());
        assert_eq!(&[JoinSide::Right], build_sides(JoinType::LeftSemi));
        assert_eq!(2, build_sides(JoinType::Full).len());
    }

    #[test]
    fn test_single_table() {
        let plan = LogicalPlanBuilder::new()
            .scan_as("t1", "X", 1)
            .limit(3)
            .build()
            .unwrap();
        assert_eq!(Some("x".to_string()), single_table(&plan.root()));
    }

    #[test]
    fn test_index_join_hint() {
        let (explain, warnings) = plan_join(JoinType::Inner, "TIDB_INLJ(t1)");
        assert!(warnings.is_empty(), "{:?}", warnings);
        assert!(explain.contains(
            "PhysicalIndexNestedLoopJoin { join_type: Inner, on: [t1.a = t2.b], inner: Right, lookup_keys: [t2.b] }"
        ));
        assert!(explain
            .contains("PhysicalTableReader { table_name: \"t2\", access: IndexScan, index: \"idx_b\" }"));
    }

    #[test]
    fn test_infeasible_index_join_hint_falls_back() {
        let (explain, warnings) = plan_join(JoinType::Left, "TIDB_INLJ(t2)");
        assert_eq!(1, warnings.len());
        match &warnings[0] {
            PlanWarning::InapplicableJoinHint { tables, .. } => {
                assert_eq!(&vec!["t2".to_string()], tables)
            }
            w => panic!("unexpected warning {:?}", w),
        }
        assert!(!explain.contains("inner: Left"));
    }

    #[test]
    fn test_merge_join_hint() {
        let (explain, warnings) = plan_join(JoinType::Inner, "MERGE_JOIN(t1, t2)");
        assert!(warnings.is_empty(), "{:?}", warnings);
        assert!(explain.contains("PhysicalSortMergeJoin { join_type: Inner, on: [t1.a = t2.b] }"));
    }

    #[test]
    fn test_hash_join_build_side() {
        let (explain, _) = plan_join(JoinType::Inner, "HASH_JOIN(t1)");
        assert!(explain
            .contains("PhysicalHashJoin { join_type: Inner, on: [t1.a = t2.b], build: Left }"));

        let (explain, _) = plan_join(JoinType::Inner, "HASH_JOIN_BUILD(t2)");
        assert!(explain.contains("build: Right"));

        let (explain, warnings) = plan_join(JoinType::LeftSemi, "HASH_JOIN_PROBE(t2)");
        assert_eq!(1, warnings.len());
        assert!(!explain.contains("build: Left"));
    }

    #[test]
    fn test_join_hint_without_join() {
        let plan = LogicalPlanBuilder::new().scan("t1", 1).build().unwrap();
        let (_, warnings) = plan_physical(plan, "HASH_JOIN(t1)");
        assert_eq!(1, warnings.len());
        assert!(matches!(
            warnings[0],
            PlanWarning::InapplicableJoinHint { .. }
        ));
    }
}
