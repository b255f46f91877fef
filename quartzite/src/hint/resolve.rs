use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use log::debug;

use crate::catalog::Catalog;
use crate::hint::{
    default_block_name, parse_hints, AggStrategy, HintBody, HintComment, HintDirective, HintName,
    JoinHint, JoinMethod, QueryBlockId, QueryBlocks, ResolvedHints, TableRef,
};
use crate::warning::{PlanWarning, WarningCollector};

/// Binds hint directives to query blocks and tables.
pub struct HintResolver<'a> {
    blocks: &'a QueryBlocks,
    catalog: &'a dyn Catalog,
    /// Names bound by `QB_NAME`, lowercase.
    names: HashMap<String, QueryBlockId>,
}

impl<'a> HintResolver<'a> {
    pub fn new(blocks: &'a QueryBlocks, catalog: &'a dyn Catalog) -> Self {
        Self {
            blocks,
            catalog,
            names: HashMap::new(),
        }
    }

    pub fn resolve(
        mut self,
        comments: &[HintComment],
        warnings: &mut WarningCollector,
    ) -> ResolvedHints {
        let directives: Vec<(QueryBlockId, HintDirective)> = comments
            .iter()
            .flat_map(|comment| match &comment.body {
                HintBody::Directives(ds) => ds
                    .iter()
                    .map(|d| (comment.block, d.clone()))
                    .collect::<Vec<_>>(),
                HintBody::Text(text) => {
                    let parsed = parse_hints(text);
                    if let Some(unparsed) = parsed.unparsed {
                        warnings.push(PlanWarning::HintSyntax { text: unparsed });
                    }
                    parsed
                        .directives
                        .into_iter()
                        .map(|d| (comment.block, d))
                        .collect()
                }
            })
            .collect();

        // Block names must be known before any reference to them is resolved.
        let mut others = Vec::with_capacity(directives.len());
        for (block, directive) in directives {
            match HintName::from_str(&directive.name) {
                Ok(HintName::QbName) => self.bind_block_name(block, &directive, warnings),
                Ok(name) => others.push((block, name, directive)),
                Err(_) => warnings.push(PlanWarning::UnsupportedHint {
                    name: directive.name.clone(),
                }),
            }
        }

        let mut resolved = ResolvedHints::default();
        let mut agg_hints = BTreeMap::<QueryBlockId, Vec<AggStrategy>>::new();
        for (block, name, directive) in others {
            let block = match &directive.block {
                Some(block_name) => match self.block_by_name(block_name, warnings) {
                    Some(b) => b,
                    None => continue,
                },
                None => block,
            };

            match name {
                HintName::UseIndex | HintName::IgnoreIndex => {
                    self.resolve_index_hint(block, name, &directive, &mut resolved, warnings)
                }
                HintName::MergeJoin
                | HintName::HashJoin
                | HintName::HashJoinBuild
                | HintName::HashJoinProbe
                | HintName::IndexNestedLoopJoin => {
                    self.resolve_join_hint(block, name, &directive, &mut resolved, warnings)
                }
                HintName::HashAgg | HintName::StreamAgg => {
                    if !directive.args.is_empty() {
                        warnings.push(PlanWarning::HintSyntax {
                            text: directive.to_string(),
                        });
                        continue;
                    }
                    let strategy = if name == HintName::HashAgg {
                        AggStrategy::Hash
                    } else {
                        AggStrategy::Stream
                    };
                    agg_hints.entry(block).or_default().push(strategy);
                }
                HintName::QbName => {}
            }
        }

        for (block, strategies) in agg_hints {
            let first = strategies[0];
            if strategies.iter().all(|s| *s == first) {
                resolved.block_mut(block).agg = Some(first);
            } else {
                warnings.push(PlanWarning::ConflictingAggHints {
                    block: self.block_display_name(block),
                });
            }
        }

        debug!("Resolved hints: {:?}", resolved);
        resolved
    }

    fn bind_block_name(
        &mut self,
        block: QueryBlockId,
        directive: &HintDirective,
        warnings: &mut WarningCollector,
    ) {
        let name = match directive.args.as_slice() {
            [arg] if arg.block.is_none() && directive.block.is_none() => {
                arg.name.to_ascii_lowercase()
            }
            _ => {
                warnings.push(PlanWarning::HintSyntax {
                    text: directive.to_string(),
                });
                return;
            }
        };

        if self.names.contains_key(&name) {
            warnings.push(PlanWarning::DuplicateQueryBlockName { name });
        } else {
            self.names.insert(name, block);
        }
    }

    /// Resolves `qb` of `@qb`, a `QB_NAME` bound name or the default `sel_N` name.
    fn block_by_name(&self, name: &str, warnings: &mut WarningCollector) -> Option<QueryBlockId> {
        let lower = name.to_ascii_lowercase();
        let block = self.names.get(&lower).copied().or_else(|| {
            lower
                .strip_prefix("sel_")
                .and_then(|n| n.parse::<QueryBlockId>().ok())
                .filter(|b| self.blocks.contains(*b))
        });

        if block.is_none() {
            warnings.push(PlanWarning::UnknownQueryBlock {
                name: name.to_string(),
            });
        }
        block
    }

    fn block_display_name(&self, block: QueryBlockId) -> String {
        self.names
            .iter()
            .filter(|(_, b)| **b == block)
            .map(|(name, _)| name.clone())
            .min()
            .unwrap_or_else(|| default_block_name(block))
    }

    /// Looks up a table argument, honoring its own `@block`.
    fn lookup_table(
        &self,
        block: QueryBlockId,
        name: &str,
        arg_block: Option<&str>,
        warnings: &mut WarningCollector,
    ) -> Option<(QueryBlockId, &'a TableRef)> {
        let block = match arg_block {
            Some(b) => self.block_by_name(b, warnings)?,
            None => block,
        };
        self.blocks.lookup(block, name).map(|t| (block, t))
    }

    fn resolve_index_hint(
        &self,
        block: QueryBlockId,
        name: HintName,
        directive: &HintDirective,
        resolved: &mut ResolvedHints,
        warnings: &mut WarningCollector,
    ) {
        let (table_arg, index_args) = match directive.args.split_first() {
            Some(split) => split,
            None => {
                warnings.push(PlanWarning::HintSyntax {
                    text: directive.to_string(),
                });
                return;
            }
        };

        let (table_block, table) =
            match self.lookup_table(block, &table_arg.name, table_arg.block.as_deref(), warnings)
            {
                Some(found) => found,
                None => {
                    warnings.push(PlanWarning::UnmatchedHintTables {
                        hint: directive.to_string(),
                        tables: vec![table_arg.to_string()],
                    });
                    return;
                }
            };

        let meta = self.catalog.table(&table.table_name);
        let mut indexes = Vec::with_capacity(index_args.len());
        for index in index_args {
            match meta.as_ref().and_then(|m| m.index(&index.name)) {
                Some(desc) => indexes.push(desc.name.clone()),
                None => warnings.push(PlanWarning::IndexNotFound {
                    table: table.visible_name.clone(),
                    index: index.name.clone(),
                }),
            }
        }

        let hint = resolved
            .block_mut(table_block)
            .index_hints
            .entry(table.visible_name.to_ascii_lowercase())
            .or_default();
        if name == HintName::UseIndex {
            hint.use_list.get_or_insert_with(Vec::new).extend(indexes);
        } else {
            hint.ignore_list.extend(indexes);
        }
    }

    fn resolve_join_hint(
        &self,
        block: QueryBlockId,
        name: HintName,
        directive: &HintDirective,
        resolved: &mut ResolvedHints,
        warnings: &mut WarningCollector,
    ) {
        if directive.args.is_empty() {
            warnings.push(PlanWarning::HintSyntax {
                text: directive.to_string(),
            });
            return;
        }

        let method = match name {
            HintName::MergeJoin => JoinMethod::SortMerge,
            HintName::HashJoinBuild => JoinMethod::HashBuild,
            HintName::HashJoinProbe => JoinMethod::HashProbe,
            HintName::IndexNestedLoopJoin => JoinMethod::IndexNestedLoop,
            _ => JoinMethod::Hash,
        };

        let mut unmatched = vec![];
        let mut matched = BTreeMap::<QueryBlockId, Vec<String>>::new();
        for arg in &directive.args {
            match self.lookup_table(block, &arg.name, arg.block.as_deref(), warnings) {
                Some((table_block, table)) => matched
                    .entry(table_block)
                    .or_default()
                    .push(table.visible_name.to_ascii_lowercase()),
                None => unmatched.push(arg.to_string()),
            }
        }

        if !unmatched.is_empty() {
            warnings.push(PlanWarning::UnmatchedHintTables {
                hint: directive.to_string(),
                tables: unmatched,
            });
        }

        for (table_block, tables) in matched {
            resolved.block_mut(table_block).join_hints.push(JoinHint {
                method,
                tables,
                text: directive.to_string(),
            });
        }
    }
}
