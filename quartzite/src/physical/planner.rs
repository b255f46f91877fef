use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use datafusion_common::Column;
use datafusion_expr::Expr;
use log::{debug, info};

use crate::catalog::TableMeta;
use crate::cost::{Cost, CostModel};
use crate::error::{PlanningError, QuartziteResult};
use crate::expr::{expr_columns, exprs_columns};
use crate::hint::{QueryBlockId, ResolvedHints};
use crate::operator::LogicalOperator::{
    LogicalAggregate, LogicalDual, LogicalFilter, LogicalJoin, LogicalLimit, LogicalProjection,
    LogicalScan, LogicalSort, LogicalTopN, LogicalUnion,
};
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{
    PhysicalLimit, PhysicalProjection, PhysicalSelection, PhysicalSort, PhysicalTableDual,
    PhysicalTableReader, PhysicalTopN, PhysicalUnion,
};
use crate::operator::{
    Dual, Filter, Limit, OperatorTrait, PhysicalOperator, Projection, PushedLimit, Scan, Sort,
    TableReader, TopN, Union,
};
use crate::optimizer::OptimizerContext;
use crate::physical::join_order::JoinReorder;
use crate::physical::{AccessPath, AccessPathEnumerator};
use crate::plan::{
    visit, Plan, PlanNodeBuilder, PlanNodeId, PlanNodeIdGen, PlanNodeRef, Visitor,
};
use crate::properties::{LogicalProperty, OrderSpec, PhysicalProp, PhysicalPropertySet};
use crate::stat::{table_stats_or_pseudo, Statistics, SELECTION_FACTOR};
use crate::warning::{PlanWarning, WarningCollector};

/// What a parent needs from the output of its input.
///
/// `limit` tells that at most this many rows will be consumed, so a source producing rows in the
/// required order may stop early.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct PhysicalRequirement {
    pub order: OrderSpec,
    pub limit: Option<usize>,
}

impl PhysicalRequirement {
    pub fn ordered(order: OrderSpec) -> Self {
        Self { order, limit: None }
    }
}

/// Best physical plan found for a logical node under one requirement.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub node: PlanNodeRef,
    /// Accumulated cost of the whole subtree.
    pub cost: Cost,
    pub rows: f64,
    /// Order of the output rows.
    pub order: OrderSpec,
    /// Breaks ties between equal cost candidates, lower wins.
    pub preference: u8,
}

impl Candidate {
    pub fn with_preference(mut self, preference: u8) -> Self {
        self.preference = preference;
        self
    }
}

/// Bottom up physical planner.
///
/// Every logical node is planned under the requirement of its parent. Alternatives of a node
/// (access paths, join and aggregation strategies) are costed and the cheapest one satisfying the
/// requirement wins, with a sort appended to alternatives which don't provide the required order.
/// Winners are kept per `(node, requirement)`, so a subtree is planned once for each distinct
/// requirement.
pub struct PhysicalPlanner<'a> {
    pub(super) context: &'a OptimizerContext,
    pub(super) hints: &'a ResolvedHints,
    pub(super) warnings: &'a mut WarningCollector,
    pub(super) cost_model: CostModel<'a>,
    id_gen: PlanNodeIdGen,
    memo: HashMap<(PlanNodeId, PhysicalRequirement), Candidate>,
    /// Columns read anywhere in the plan, an index path covering them needs no double read.
    needed_columns: HashSet<Column>,
    /// Join hints which matched some join, by block and position in the block.
    pub(super) matched_join_hints: HashSet<(QueryBlockId, usize)>,
}

impl<'a> PhysicalPlanner<'a> {
    pub fn new(
        context: &'a OptimizerContext,
        hints: &'a ResolvedHints,
        warnings: &'a mut WarningCollector,
    ) -> Self {
        Self {
            context,
            hints,
            warnings,
            cost_model: CostModel::new(&context.config.cost),
            id_gen: PlanNodeIdGen::new(),
            memo: HashMap::new(),
            needed_columns: HashSet::new(),
            matched_join_hints: HashSet::new(),
        }
    }

    pub fn plan(mut self, logical_plan: &Plan) -> QuartziteResult<Plan> {
        let root = with_logical_props(&logical_plan.root(), self.context)?;
        let plan = JoinReorder::new(logical_plan, self.hints, self.context)
            .reorder(&Plan::new(root))?;
        self.needed_columns = needed_columns(&plan)?;

        let best = visit(&mut self, PhysicalRequirement::default(), plan.root())?;

        let hints = self.hints;
        for (block, idx, hint) in hints.iter_join_hints() {
            if !self.matched_join_hints.contains(&(block, idx)) {
                self.warnings.push(PlanWarning::InapplicableJoinHint {
                    hint: hint.text.clone(),
                    tables: hint.tables.clone(),
                    reason: "no join of these tables in the query block".to_string(),
                });
            }
        }

        info!("Found best physical plan with cost {}", best.cost);
        Ok(Plan::new(best.node))
    }

    pub(super) fn logical_prop<'n>(
        &self,
        node: &'n PlanNodeRef,
    ) -> QuartziteResult<&'n LogicalProperty> {
        node.logical_prop().ok_or_else(|| {
            PlanningError::InvalidPlan(format!("node {} has no logical property", node.id()))
                .into()
        })
    }

    /// Names of columns of `scan` read by the plan.
    pub(super) fn needed_of_scan(&self, scan: &Scan, table: &TableMeta) -> HashSet<String> {
        self.needed_columns
            .iter()
            .filter(|c| match &c.relation {
                Some(r) => r.table().eq_ignore_ascii_case(scan.visible_name()),
                None => table.field(&c.name).is_some(),
            })
            .map(|c| c.name.clone())
            .collect()
    }

    /// Creates a physical node for logical node `logical`, charging `cost` on top of `inputs`.
    pub(super) fn build_candidate(
        &mut self,
        logical: &PlanNodeRef,
        operator: PhysicalOperator,
        inputs: &[&Candidate],
        cost: Cost,
        rows: f64,
        order: OrderSpec,
    ) -> Candidate {
        let total = inputs.iter().map(|c| c.cost).sum::<Cost>() + cost;
        let node = PlanNodeBuilder::new(self.id_gen.gen_next(), &Physical(operator))
            .add_inputs(inputs.iter().map(|c| c.node.clone()))
            .with_logical_prop(logical.logical_prop().cloned())
            .with_statistics(Some(Statistics::new(rows)))
            .with_physical_props(Some(PhysicalPropertySet::new(order.clone())))
            .build();

        Candidate {
            node: Arc::new(node),
            cost: total,
            rows,
            order,
            preference: 0,
        }
    }

    fn enforce_order(
        &mut self,
        logical: &PlanNodeRef,
        candidate: Candidate,
        order: &OrderSpec,
    ) -> Candidate {
        let cost = self.cost_model.sort(candidate.rows);
        let rows = candidate.rows;
        let preference = candidate.preference;
        self.build_candidate(
            logical,
            PhysicalSort(Sort::new(order.clone())),
            &[&candidate],
            cost,
            rows,
            order.clone(),
        )
        .with_preference(preference)
    }

    /// Picks the cheapest candidate, preferring one which needs no sort and then the lower
    /// preference.
    fn choose(
        &mut self,
        logical: &PlanNodeRef,
        candidates: Vec<Candidate>,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Candidate> {
        let mut best: Option<(Candidate, bool)> = None;
        for candidate in candidates {
            let (candidate, enforced) = if candidate.order.satisfies(&required.order) {
                (candidate, false)
            } else {
                (self.enforce_order(logical, candidate, &required.order), true)
            };

            let better = match &best {
                None => true,
                Some((b, b_enforced)) => {
                    (candidate.cost.value(), enforced, candidate.preference)
                        < (b.cost.value(), *b_enforced, b.preference)
                }
            };
            if better {
                best = Some((candidate, enforced));
            }
        }

        best.map(|(c, _)| c)
            .ok_or_else(|| anyhow!("No physical plan found for node {}", logical.id()))
    }

    fn plan_node(
        &mut self,
        node: &PlanNodeRef,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        let operator = match node.operator() {
            Logical(op) => op,
            Physical(op) => bail!("Can't plan physical operator {}", op.as_ref()),
        };

        match operator {
            LogicalScan(scan) => self.plan_scan(node, scan, required),
            LogicalFilter(filter) => self.plan_filter(node, filter, required),
            LogicalProjection(projection) => self.plan_projection(node, projection, required),
            LogicalSort(sort) => self.plan_sort(node, sort, required),
            LogicalLimit(limit) => self.plan_limit(node, limit),
            LogicalTopN(top_n) => self.plan_top_n(node, top_n),
            LogicalUnion(_) => self.plan_union(node, required),
            LogicalDual(dual) => Ok(vec![self.build_candidate(
                node,
                PhysicalTableDual(dual.clone()),
                &[],
                Cost::zero(),
                0.0,
                OrderSpec::default(),
            )]),
            LogicalJoin(join) => self.plan_join(node, join, required),
            LogicalAggregate(agg) => self.plan_aggregate(node, agg),
        }
    }

    fn plan_scan(
        &mut self,
        node: &PlanNodeRef,
        scan: &Scan,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        let table = self
            .context
            .catalog
            .table(scan.table_name())
            .ok_or_else(|| PlanningError::UnknownTable(scan.table_name().to_string()))?;
        let stats = table_stats_or_pseudo(self.context.stats.as_ref(), scan.table_name());
        let needed = self.needed_of_scan(scan, &table);
        let hint = self.hints.index_hint(scan.block(), scan.visible_name());

        let paths = AccessPathEnumerator::new(&self.context.config, &table, &stats)
            .enumerate(scan, &needed, hint)?;

        if paths.iter().any(|p| p.is_empty()) {
            debug!("Filters of {} match no row", scan.visible_name());
            let dual = Dual::new(self.logical_prop(node)?.schema_ref());
            return Ok(vec![self.build_candidate(
                node,
                PhysicalTableDual(dual),
                &[],
                Cost::zero(),
                0.0,
                OrderSpec::default(),
            )]);
        }

        Ok(paths
            .into_iter()
            .map(|path| self.scan_candidate(node, scan, path, required))
            .collect())
    }

    fn scan_candidate(
        &mut self,
        node: &PlanNodeRef,
        scan: &Scan,
        path: AccessPath,
        required: &PhysicalRequirement,
    ) -> Candidate {
        let required_direction = path.order_direction(&required.order);
        let pushed_direction = scan.pushed().and_then(|p| path.order_direction(p.order()));
        let desc = required_direction.or(pushed_direction).unwrap_or(false);
        let path = path.with_desc(desc);

        // Rows after which reading may stop.
        let mut stop_after = required_direction.and(required.limit);
        let mut output_rows = path.output_rows;
        let mut reader_pushed = None;
        if let Some(pushed) = scan.pushed() {
            if pushed.order().is_empty() || pushed_direction == Some(desc) {
                reader_pushed = Some(PushedLimit::new(OrderSpec::default(), pushed.count()));
                stop_after = Some(stop_after.map_or(pushed.count(), |n| n.min(pushed.count())));
            } else {
                reader_pushed = Some(pushed.clone());
            }
            output_rows = output_rows.min(pushed.count() as f64);
        }

        let rows_read = match stop_after {
            Some(n) if path.output_rows > 0.0 => {
                output_rows = output_rows.min(n as f64);
                path.range_rows * (n as f64 / path.output_rows).min(1.0)
            }
            _ => path.range_rows,
        };

        let order = if required_direction.is_some() {
            required.order.clone()
        } else {
            path.provided_order()
        };
        let cost = path.cost(&self.cost_model, rows_read);
        let preference = u8::from(path.is_double_read());
        let reader = TableReader::new(scan, path).with_pushed(reader_pushed);

        self.build_candidate(
            node,
            PhysicalTableReader(reader),
            &[],
            cost,
            output_rows,
            order,
        )
        .with_preference(preference)
    }

    fn plan_filter(
        &mut self,
        node: &PlanNodeRef,
        filter: &Filter,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        let child_required = PhysicalRequirement {
            order: required.order.clone(),
            limit: required
                .limit
                .map(|n| (n as f64 / SELECTION_FACTOR).ceil() as usize),
        };
        let child = self.visit(child_required, input(node, 0)?)?;

        let cost = self.cost_model.cpu(child.rows);
        let order = child.order.clone();
        Ok(vec![self.build_candidate(
            node,
            PhysicalSelection(filter.clone()),
            &[&child],
            cost,
            child.rows * SELECTION_FACTOR,
            order,
        )])
    }

    /// Rewrites `order` on projection output in terms of projection input.
    fn order_below_projection(
        &self,
        node: &PlanNodeRef,
        projection: &Projection,
        order: &OrderSpec,
    ) -> QuartziteResult<Option<OrderSpec>> {
        let output = self.logical_prop(node)?.columns();
        Ok(order
            .orders()
            .iter()
            .map(|o| {
                let idx = output.iter().position(|c| c == o.column())?;
                match projection.expr().get(idx)?.clone().unalias() {
                    Expr::Column(c) => Some(o.with_column(c)),
                    _ => None,
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(OrderSpec::new))
    }

    fn plan_projection(
        &mut self,
        node: &PlanNodeRef,
        projection: &Projection,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        let (child_order, order) =
            match self.order_below_projection(node, projection, &required.order)? {
                Some(child_order) => (child_order, required.order.clone()),
                None => (OrderSpec::default(), OrderSpec::default()),
            };
        let child_required = PhysicalRequirement {
            order: child_order,
            limit: required.limit,
        };
        let child = self.visit(child_required, input(node, 0)?)?;

        let cost = self.cost_model.cpu(child.rows);
        let rows = child.rows;
        Ok(vec![self.build_candidate(
            node,
            PhysicalProjection(projection.clone()),
            &[&child],
            cost,
            rows,
            order,
        )])
    }

    /// A sort satisfied by its input disappears, otherwise the input gets a sort enforced.
    fn plan_sort(
        &mut self,
        node: &PlanNodeRef,
        sort: &Sort,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        let child_required = PhysicalRequirement {
            order: sort.order().clone(),
            limit: required.limit,
        };
        Ok(vec![self.visit(child_required, input(node, 0)?)?])
    }

    /// Which rows a limit keeps is decided by its input alone, so an order required above the
    /// limit is never pushed below it and is enforced on the limit output instead.
    fn plan_limit(
        &mut self,
        node: &PlanNodeRef,
        limit: &Limit,
    ) -> QuartziteResult<Vec<Candidate>> {
        let child_required = PhysicalRequirement {
            order: OrderSpec::default(),
            limit: Some(limit.fetch()),
        };
        let child = self.visit(child_required, input(node, 0)?)?;

        let rows = limited_rows(child.rows, limit);
        let order = child.order.clone();
        Ok(vec![self.build_candidate(
            node,
            PhysicalLimit(limit.clone()),
            &[&child],
            Cost::zero(),
            rows,
            order,
        )])
    }

    /// Either a limit over input read in order, or a top n heap over unordered input.
    fn plan_top_n(
        &mut self,
        node: &PlanNodeRef,
        top_n: &TopN,
    ) -> QuartziteResult<Vec<Candidate>> {
        let input = input(node, 0)?;
        let fetch = top_n.limit().fetch();

        let ordered = self.visit(
            PhysicalRequirement {
                order: top_n.order().clone(),
                limit: Some(fetch),
            },
            input.clone(),
        )?;
        let rows = limited_rows(ordered.rows, top_n.limit());
        let limit = self.build_candidate(
            node,
            PhysicalLimit(top_n.limit().clone()),
            &[&ordered],
            Cost::zero(),
            rows,
            top_n.order().clone(),
        );

        let unordered = self.visit(PhysicalRequirement::default(), input)?;
        let cost = self.cost_model.top_n(unordered.rows, fetch);
        let rows = limited_rows(unordered.rows, top_n.limit());
        let heap = self
            .build_candidate(
                node,
                PhysicalTopN(top_n.clone()),
                &[&unordered],
                cost,
                rows,
                top_n.order().clone(),
            )
            .with_preference(1);

        Ok(vec![limit, heap])
    }

    fn plan_union(
        &mut self,
        node: &PlanNodeRef,
        required: &PhysicalRequirement,
    ) -> QuartziteResult<Vec<Candidate>> {
        let child_required = PhysicalRequirement {
            order: OrderSpec::default(),
            limit: required.limit,
        };
        let children = node
            .inputs()
            .iter()
            .map(|i| self.visit(child_required.clone(), i.clone()))
            .collect::<QuartziteResult<Vec<Candidate>>>()?;

        let rows = children.iter().map(|c| c.rows).sum();
        let inputs: Vec<&Candidate> = children.iter().collect();
        Ok(vec![self.build_candidate(
            node,
            PhysicalUnion(Union::new()),
            &inputs,
            Cost::zero(),
            rows,
            OrderSpec::default(),
        )])
    }
}

impl<'a> Visitor for PhysicalPlanner<'a> {
    type C = PhysicalRequirement;
    type R = Candidate;

    fn visit(
        &mut self,
        required: PhysicalRequirement,
        node: PlanNodeRef,
    ) -> QuartziteResult<Candidate> {
        let key = (node.id(), required);
        if let Some(found) = self.memo.get(&key) {
            return Ok(found.clone());
        }

        let candidates = self.plan_node(&node, &key.1)?;
        let best = self.choose(&node, candidates, &key.1)?;
        debug!(
            "Best plan of node {} under {:?}: {} with cost {}",
            node.id(),
            key.1,
            best.node.operator(),
            best.cost
        );
        self.memo.insert(key, best.clone());
        Ok(best)
    }
}

pub(super) fn input(node: &PlanNodeRef, idx: usize) -> QuartziteResult<PlanNodeRef> {
    node.inputs().get(idx).cloned().ok_or_else(|| {
        PlanningError::InvalidPlan(format!("node {} misses input {}", node.id(), idx)).into()
    })
}

fn limited_rows(rows: f64, limit: &Limit) -> f64 {
    (rows - limit.offset() as f64)
        .max(0.0)
        .min(limit.count() as f64)
}

/// Copies of nodes without logical property, with property derived from inputs.
pub(super) fn with_logical_props(
    node: &PlanNodeRef,
    context: &OptimizerContext,
) -> QuartziteResult<PlanNodeRef> {
    let inputs = node
        .inputs()
        .iter()
        .map(|i| with_logical_props(i, context))
        .collect::<QuartziteResult<Vec<PlanNodeRef>>>()?;
    let unchanged = inputs
        .iter()
        .zip(node.inputs())
        .all(|(a, b)| Arc::ptr_eq(a, b));
    if unchanged && node.logical_prop().is_some() {
        return Ok(node.clone());
    }

    let logical_prop = match node.logical_prop() {
        Some(prop) => prop.clone(),
        None => {
            let input_props = inputs
                .iter()
                .map(|i| i.logical_prop())
                .collect::<Option<Vec<&LogicalProperty>>>()
                .ok_or_else(|| anyhow!("Input of node {} has no logical property", node.id()))?;
            node.operator().derive_logical_prop(&input_props, context)?
        }
    };

    Ok(Arc::new(
        PlanNodeBuilder::new(node.id(), node.operator())
            .add_inputs(inputs)
            .with_logical_prop(Some(logical_prop))
            .build(),
    ))
}

/// Columns referenced by any operator, plus the output columns of the plan.
fn needed_columns(plan: &Plan) -> QuartziteResult<HashSet<Column>> {
    let mut columns: HashSet<Column> = plan
        .root()
        .logical_prop()
        .map(|p| p.columns())
        .unwrap_or_default()
        .into_iter()
        .collect();

    for node in plan.bfs_iterator() {
        match node.operator() {
            Logical(LogicalScan(scan)) => {
                columns.extend(exprs_columns(scan.filters())?);
                if let Some(pushed) = scan.pushed() {
                    columns.extend(pushed.order().columns().cloned());
                }
            }
            Logical(LogicalFilter(filter)) => columns.extend(expr_columns(filter.predicate())?),
            Logical(LogicalProjection(projection)) => {
                columns.extend(exprs_columns(projection.expr())?)
            }
            Logical(LogicalJoin(join)) => {
                for (l, r) in join.on() {
                    columns.insert(l.clone());
                    columns.insert(r.clone());
                }
                if let Some(filter) = join.filter() {
                    columns.extend(expr_columns(filter)?);
                }
            }
            Logical(LogicalAggregate(agg)) => {
                columns.extend(exprs_columns(agg.group_by().iter().chain(agg.aggr()))?)
            }
            Logical(LogicalSort(sort)) => columns.extend(sort.order().columns().cloned()),
            Logical(LogicalTopN(top_n)) => columns.extend(top_n.order().columns().cloned()),
            // Union inputs are matched by position, so every input column may be read.
            Logical(LogicalUnion(_)) => {
                for input in node.inputs() {
                    columns.extend(input.logical_prop().map(|p| p.columns()).unwrap_or_default());
                }
            }
            _ => {}
        }
    }
    Ok(columns)
}
