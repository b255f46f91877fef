//! Optimizer hints.
//!
//! Hints arrive as comment bodies (`/*+ HASH_JOIN(t1, t2) USE_INDEX(t, idx) */`) or as directives
//! already tokenized by the parser. Each comment belongs to the query block it occurs in. The
//! [`HintResolver`] binds every directive to a query block and the tables visible in it, and
//! produces an immutable [`ResolvedHints`] consumed by the planner. A hint that can't be bound is
//! dropped with a warning, it never fails planning.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use enumset::EnumSetType;
use itertools::Itertools;
use strum_macros::{AsRefStr, EnumString};

use crate::operator::LogicalOperator::{LogicalAggregate, LogicalJoin, LogicalScan};
use crate::operator::Operator::Logical;
use crate::plan::Plan;

mod parse;
pub use parse::*;
mod resolve;
pub use resolve::*;

/// Query block number, `1` is the outermost SELECT and is rendered as `sel_1`.
pub type QueryBlockId = usize;

pub fn default_block_name(block: QueryBlockId) -> String {
    format!("sel_{}", block)
}

/// Hint names understood by the planner. Parsing is case insensitive and accepts aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum HintName {
    #[strum(to_string = "QB_NAME")]
    QbName,
    #[strum(to_string = "USE_INDEX", serialize = "FORCE_INDEX")]
    UseIndex,
    #[strum(to_string = "IGNORE_INDEX")]
    IgnoreIndex,
    #[strum(to_string = "MERGE_JOIN", serialize = "TIDB_SMJ", serialize = "SM_JOIN")]
    MergeJoin,
    #[strum(to_string = "HASH_JOIN", serialize = "TIDB_HJ")]
    HashJoin,
    #[strum(to_string = "HASH_JOIN_BUILD")]
    HashJoinBuild,
    #[strum(to_string = "HASH_JOIN_PROBE")]
    HashJoinProbe,
    #[strum(to_string = "INL_JOIN", serialize = "TIDB_INLJ")]
    IndexNestedLoopJoin,
    #[strum(to_string = "HASH_AGG")]
    HashAgg,
    #[strum(to_string = "STREAM_AGG")]
    StreamAgg,
}

/// One argument of a directive, a table, index or block name with optional `@block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintArg {
    pub name: String,
    pub block: Option<String>,
}

impl HintArg {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            block: None,
        }
    }

    pub fn in_block<S: Into<String>, B: Into<String>>(name: S, block: B) -> Self {
        Self {
            name: name.into(),
            block: Some(block.into()),
        }
    }
}

impl Display for HintArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(block) = &self.block {
            write!(f, "@{}", block)?;
        }
        Ok(())
    }
}

/// Tokenized hint `NAME(@block arg, ...)`.
///
/// `name` is kept as written, so an unknown hint can be reported verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintDirective {
    pub name: String,
    pub block: Option<String>,
    pub args: Vec<HintArg>,
}

impl HintDirective {
    pub fn new<S: Into<String>, I: IntoIterator<Item = HintArg>>(name: S, args: I) -> Self {
        Self {
            name: name.into(),
            block: None,
            args: args.into_iter().collect(),
        }
    }

    pub fn with_block<S: Into<String>>(mut self, block: S) -> Self {
        self.block = Some(block.into());
        self
    }
}

impl Display for HintDirective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name.to_ascii_uppercase())?;
        if let Some(block) = &self.block {
            write!(f, "@{}", block)?;
            if !self.args.is_empty() {
                write!(f, " ")?;
            }
        }
        write!(f, "{})", self.args.iter().join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintBody {
    /// Raw comment text, with or without the `/*+ */` delimiters.
    Text(String),
    Directives(Vec<HintDirective>),
}

/// A hint comment and the query block it physically occurs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintComment {
    pub block: QueryBlockId,
    pub body: HintBody,
}

impl HintComment {
    pub fn text<S: Into<String>>(block: QueryBlockId, text: S) -> Self {
        Self {
            block,
            body: HintBody::Text(text.into()),
        }
    }

    pub fn directives<I: IntoIterator<Item = HintDirective>>(
        block: QueryBlockId,
        directives: I,
    ) -> Self {
        Self {
            block,
            body: HintBody::Directives(directives.into_iter().collect()),
        }
    }
}

/// Join algorithm requested by a hint.
#[derive(EnumSetType, Debug, AsRefStr)]
pub enum JoinMethod {
    SortMerge,
    Hash,
    /// Hash join building the hash table on the named table.
    HashBuild,
    /// Hash join probing with the named table.
    HashProbe,
    IndexNestedLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
pub enum AggStrategy {
    Hash,
    Stream,
}

/// Index restriction of one table.
///
/// `use_list` of `Some(empty)` restricts the table to row access. Indexes in `ignore_list` are
/// removed after `use_list` is applied, so ignoring wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexHint {
    pub use_list: Option<Vec<String>>,
    pub ignore_list: Vec<String>,
}

impl IndexHint {
    /// Whether an access path through `index` (`None` for the table itself) survives this hint.
    pub fn allows(&self, index: Option<&str>) -> bool {
        let contains =
            |list: &[String], name: &str| list.iter().any(|n| n.eq_ignore_ascii_case(name));
        match index {
            None => self.use_list.as_ref().map(|l| l.is_empty()).unwrap_or(true),
            Some(name) => {
                self.use_list
                    .as_ref()
                    .map(|l| contains(l, name))
                    .unwrap_or(true)
                    && !contains(&self.ignore_list, name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinHint {
    pub method: JoinMethod,
    /// Visible names of matched tables, lowercase.
    pub tables: Vec<String>,
    /// Directive as written, used in warnings.
    pub text: String,
}

/// Hints bound to one query block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHints {
    index_hints: HashMap<String, IndexHint>,
    join_hints: Vec<JoinHint>,
    agg: Option<AggStrategy>,
}

impl BlockHints {
    pub fn index_hint(&self, visible_name: &str) -> Option<&IndexHint> {
        self.index_hints.get(&visible_name.to_ascii_lowercase())
    }

    pub fn join_hints(&self) -> &[JoinHint] {
        &self.join_hints
    }

    pub fn agg_strategy(&self) -> Option<AggStrategy> {
        self.agg
    }
}

/// Hints of every query block of a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedHints {
    blocks: BTreeMap<QueryBlockId, BlockHints>,
}

impl ResolvedHints {
    pub fn block(&self, block: QueryBlockId) -> Option<&BlockHints> {
        self.blocks.get(&block)
    }

    pub fn index_hint(&self, block: QueryBlockId, visible_name: &str) -> Option<&IndexHint> {
        self.block(block).and_then(|b| b.index_hint(visible_name))
    }

    pub fn agg_strategy(&self, block: QueryBlockId) -> Option<AggStrategy> {
        self.block(block).and_then(|b| b.agg_strategy())
    }

    pub fn join_hints(&self, block: QueryBlockId) -> &[JoinHint] {
        self.block(block).map(|b| b.join_hints()).unwrap_or(&[])
    }

    pub fn iter_join_hints(&self) -> impl Iterator<Item = (QueryBlockId, usize, &JoinHint)> {
        self.blocks.iter().flat_map(|(block, hints)| {
            hints
                .join_hints
                .iter()
                .enumerate()
                .map(move |(idx, h)| (*block, idx, h))
        })
    }

    fn block_mut(&mut self, block: QueryBlockId) -> &mut BlockHints {
        self.blocks.entry(block).or_default()
    }
}

/// A table visible in a query block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table_name: String,
    /// Alias if any, otherwise table name.
    pub visible_name: String,
}

/// Query blocks of a plan and the tables visible in each.
#[derive(Debug, Clone, Default)]
pub struct QueryBlocks {
    blocks: BTreeMap<QueryBlockId, Vec<TableRef>>,
}

impl QueryBlocks {
    pub fn from_plan(plan: &Plan) -> Self {
        let mut blocks = Self::default();
        for node in plan.bfs_iterator() {
            match node.operator() {
                Logical(LogicalScan(scan)) => {
                    blocks.add_table(scan.block(), scan.table_name(), scan.visible_name())
                }
                Logical(LogicalJoin(join)) => blocks.add_block(join.block()),
                Logical(LogicalAggregate(agg)) => blocks.add_block(agg.block()),
                _ => {}
            }
        }
        blocks
    }

    pub fn add_block(&mut self, block: QueryBlockId) {
        self.blocks.entry(block).or_default();
    }

    pub fn add_table<S: Into<String>, V: Into<String>>(
        &mut self,
        block: QueryBlockId,
        table_name: S,
        visible_name: V,
    ) {
        self.blocks.entry(block).or_default().push(TableRef {
            table_name: table_name.into(),
            visible_name: visible_name.into(),
        });
    }

    pub fn contains(&self, block: QueryBlockId) -> bool {
        self.blocks.contains_key(&block)
    }

    /// Finds a table visible in `block` by alias or, when it has none, by table name.
    pub fn lookup(&self, block: QueryBlockId, name: &str) -> Option<&TableRef> {
        self.blocks
            .get(&block)?
            .iter()
            .find(|t| t.visible_name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::hint::{HintArg, HintDirective, HintName, IndexHint};

    #[test]
    fn test_hint_name_aliases() {
        assert_eq!(HintName::IndexNestedLoopJoin, HintName::from_str("tidb_inlj").unwrap());
        assert_eq!(HintName::IndexNestedLoopJoin, HintName::from_str("INL_JOIN").unwrap());
        assert_eq!(HintName::MergeJoin, HintName::from_str("Tidb_Smj").unwrap());
        assert_eq!(HintName::UseIndex, HintName::from_str("force_index").unwrap());
        assert_eq!("USE_INDEX", HintName::UseIndex.as_ref());
        assert!(HintName::from_str("NO_DECORRELATE").is_err());
    }

    #[test]
    fn test_directive_display() {
        let directive = HintDirective::new(
            "hash_join",
            vec![HintArg::new("t1"), HintArg::in_block("t2", "qb")],
        )
        .with_block("sel_2");
        assert_eq!("HASH_JOIN(@sel_2 t1, t2@qb)", directive.to_string());
        assert_eq!("HASH_AGG()", HintDirective::new("HASH_AGG", vec![]).to_string());
    }

    #[test]
    fn test_ignore_wins_over_use() {
        let hint = IndexHint {
            use_list: Some(vec!["idx_a".to_string(), "idx_b".to_string()]),
            ignore_list: vec!["IDX_A".to_string()],
        };
        assert!(!hint.allows(Some("idx_a")));
        assert!(hint.allows(Some("idx_b")));
        assert!(!hint.allows(Some("idx_c")));
        assert!(!hint.allows(None));

        let table_only = IndexHint {
            use_list: Some(vec![]),
            ignore_list: vec![],
        };
        assert!(table_only.allows(None));
        assert!(!table_only.allows(Some("idx_a")));
    }
}
