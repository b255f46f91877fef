use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use datafusion_common::Column;

use crate::catalog::{IndexColumn, IndexDescriptor, MemoryCatalog, TableMeta};
use crate::heuristic::{Binding, HepOptimizer, MatchOrder};
use crate::optimizer::{OptimizerContext, Optimizer};
use crate::plan::explain::explain_to_string;
use crate::plan::Plan;
use crate::rules::{OptExpression, Rule, RuleImpl, RuleResult};
use crate::stat::{ColumnStatistics, MemoryStatsProvider, Statistics};

pub const T3_SCHEMA_JSON: &str = r#"{
    "fields": [
        {
            "name": "a",
            "nullable": true,
            "data_type": "Int64",
            "dict_id": 0,
            "dict_is_ordered": false,
            "metadata": {}
        },
        {
            "name": "b",
            "nullable": true,
            "data_type": "Int64",
            "dict_id": 0,
            "dict_is_ordered": false,
            "metadata": {}
        },
        {
            "name": "c",
            "nullable": true,
            "data_type": "Utf8",
            "dict_id": 0,
            "dict_is_ordered": false,
            "metadata": {}
        }
    ],
    "metadata": {}
}"#;

pub fn column(name: &str) -> Column {
    Column::from_qualified_name(name)
}

pub fn table_meta_from_schema(name: &str, json: &str) -> TableMeta {
    let schema: Schema = serde_json::from_str(json).unwrap();
    TableMeta::new(name, schema)
}

fn keyed_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("a", DataType::Int64, true),
        Field::new("b", DataType::Int64, true),
        Field::new("c", DataType::Utf8, true),
    ])
}

/// Tables used across unit tests.
///
/// * `t(id, a, b, c)`: handle `id`, indexes `idx_a(a)`, `idx_bc(b, c)`.
/// * `t1(id, a, b, c)`: handle `id`, index `idx_a(a)`.
/// * `t2(id, a, b, c)`: handle `id`, index `idx_b(b)`.
/// * `t3(a, b, c)`: no index.
pub fn test_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.register_table(
        TableMeta::new("t", keyed_schema())
            .with_handle("id")
            .with_index(IndexDescriptor::new("idx_a", vec![IndexColumn::new("a")], false))
            .with_index(IndexDescriptor::new(
                "idx_bc",
                vec![IndexColumn::new("b"), IndexColumn::new("c")],
                false,
            )),
    );
    catalog.register_table(
        TableMeta::new("t1", keyed_schema())
            .with_handle("id")
            .with_index(IndexDescriptor::new("idx_a", vec![IndexColumn::new("a")], false)),
    );
    catalog.register_table(
        TableMeta::new("t2", keyed_schema())
            .with_handle("id")
            .with_index(IndexDescriptor::new("idx_b", vec![IndexColumn::new("b")], false)),
    );
    catalog.register_table(table_meta_from_schema("t3", T3_SCHEMA_JSON));
    catalog
}

pub fn test_stats() -> MemoryStatsProvider {
    MemoryStatsProvider::new()
        .with_table(
            "t",
            Statistics::new(10000.0)
                .with_column("a", ColumnStatistics::new(1000.0, 0.0))
                .with_column("b", ColumnStatistics::new(100.0, 0.0)),
        )
        .with_table("t1", Statistics::new(1000.0))
        .with_table(
            "t2",
            Statistics::new(100000.0).with_column("b", ColumnStatistics::new(50000.0, 0.0)),
        )
}

pub fn test_context() -> OptimizerContext {
    OptimizerContext::new(Arc::new(test_catalog()), Arc::new(test_stats()))
}

pub fn build_hep_optimizer_for_test(plan: Plan) -> HepOptimizer {
    HepOptimizer::new(MatchOrder::TopDown, usize::MAX, vec![], plan, test_context()).unwrap()
}

/// Binds `rule` at plan root and applies it once.
pub fn apply_rule_at_root<R: Rule>(
    rule: &R,
    optimizer: &HepOptimizer,
) -> Vec<OptExpression<HepOptimizer>> {
    let mut result = RuleResult::new();
    if let Some(opt_expr) = Binding::new(optimizer.root_node_id(), rule.pattern(), optimizer)
        .next()
        .unwrap()
    {
        rule.apply(opt_expr, optimizer, &mut result).unwrap();
    }
    result.results().collect()
}

/// Runs `rules` to a fixed point and explains the result.
pub fn rewrite_to_string(plan: Plan, rules: Vec<RuleImpl>) -> String {
    let optimizer =
        HepOptimizer::new(MatchOrder::TopDown, 64, rules, plan, test_context()).unwrap();
    explain_to_string(&optimizer.find_best_plan().unwrap()).unwrap()
}
