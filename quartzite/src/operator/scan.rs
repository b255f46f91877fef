use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use datafusion_common::{Column, DFField, DFSchema, OwnedTableReference};
use datafusion_expr::Expr;

use crate::error::{PlanningError, QuartziteResult};
use crate::hint::QueryBlockId;
use crate::operator::{DisplayFields, DisplayList, DisplayValue, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::physical::AccessPath;
use crate::properties::{LogicalProperty, OrderSpec};

/// Limit pushed into a data source. With a non-empty `order` it is a TopN.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PushedLimit {
    order: OrderSpec,
    count: usize,
}

impl PushedLimit {
    pub fn new(order: OrderSpec, count: usize) -> Self {
        Self { order, count }
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether `self` already keeps no more rows than `other` would.
    pub fn covers(&self, other: &PushedLimit) -> bool {
        self.order == other.order && self.count <= other.count
    }
}

impl Display for PushedLimit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.order.is_empty() {
            write!(f, "limit {}", self.count)
        } else {
            write!(f, "top {} by {}", self.count, self.order)
        }
    }
}

/// Logical read of one base table.
///
/// Filters merged into the scan are candidates for range derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct Scan {
    table_name: String,
    alias: Option<String>,
    block: QueryBlockId,
    filters: Vec<Expr>,
    pushed: Option<PushedLimit>,
}

impl Scan {
    pub fn new<S: Into<String>>(table_name: S, block: QueryBlockId) -> Self {
        Self {
            table_name: table_name.into(),
            alias: None,
            block,
            filters: vec![],
            pushed: None,
        }
    }

    pub fn with_alias<S: Into<String>>(mut self, alias: S) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_filters<I: IntoIterator<Item = Expr>>(mut self, filters: I) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn with_pushed(mut self, pushed: PushedLimit) -> Self {
        self.pushed = Some(pushed);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name columns of this scan are qualified by, the alias shadows the table name.
    pub fn visible_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }

    pub fn block(&self) -> QueryBlockId {
        self.block
    }

    /// Column `name` of this scan, qualified by the visible name.
    pub fn column(&self, name: &str) -> Column {
        Column::new(
            Some(OwnedTableReference::bare(self.visible_name().to_string())),
            name,
        )
    }

    pub fn filters(&self) -> &[Expr] {
        &self.filters
    }

    pub fn pushed(&self) -> Option<&PushedLimit> {
        self.pushed.as_ref()
    }
}

impl OperatorTrait for Scan {
    fn derive_logical_prop(
        &self,
        _inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        let table = context
            .catalog
            .table(&self.table_name)
            .ok_or_else(|| PlanningError::UnknownTable(self.table_name.clone()))?;

        let qualifier = self.visible_name().to_string();
        let fields = table
            .schema()
            .fields()
            .iter()
            .map(|f| {
                DFField::new(
                    Some(qualifier.clone()),
                    f.name(),
                    f.data_type().clone(),
                    f.is_nullable(),
                )
            })
            .collect();

        Ok(LogicalProperty::new(DFSchema::new_with_metadata(
            fields,
            HashMap::new(),
        )?))
    }
}

impl DisplayFields for Scan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("table_name", &self.table_name);
        if let Some(alias) = &self.alias {
            s.field("alias", alias);
        }
        if !self.filters.is_empty() {
            s.field("filters", &DisplayList(&self.filters));
        }
        if let Some(pushed) = &self.pushed {
            s.field("pushed", &DisplayValue(pushed));
        }
        s.finish()
    }
}

/// Physical read of one base table through an [`AccessPath`].
#[derive(Clone, Debug, PartialEq)]
pub struct TableReader {
    table_name: String,
    alias: Option<String>,
    path: AccessPath,
    pushed: Option<PushedLimit>,
}

impl TableReader {
    pub fn new(scan: &Scan, path: AccessPath) -> Self {
        Self {
            table_name: scan.table_name.clone(),
            alias: scan.alias.clone(),
            path,
            pushed: None,
        }
    }

    pub fn with_pushed(mut self, pushed: Option<PushedLimit>) -> Self {
        self.pushed = pushed;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn path(&self) -> &AccessPath {
        &self.path
    }

    pub fn pushed(&self) -> Option<&PushedLimit> {
        self.pushed.as_ref()
    }
}

impl DisplayFields for TableReader {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("table_name", &self.table_name);
        if let Some(alias) = &self.alias {
            s.field("alias", alias);
        }
        s.field("access", &DisplayValue(self.path.kind.as_ref()));
        if let Some(index) = &self.path.index {
            s.field("index", &index.name);
        }
        if !self.path.ranges.iter().all(|r| r.is_full()) || self.path.ranges.is_empty() {
            s.field("ranges", &DisplayList(&self.path.ranges));
        }
        if self.path.desc {
            s.field("desc", &true);
        }
        if !self.path.residual_conditions.is_empty() {
            s.field("residual", &DisplayList(&self.path.residual_conditions));
        }
        if let Some(pushed) = &self.pushed {
            s.field("pushed", &DisplayValue(pushed));
        }
        s.finish()
    }
}
