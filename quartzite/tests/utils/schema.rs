use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use quartzite::catalog::{IndexColumn, IndexDescriptor, MemoryCatalog, TableMeta};
use quartzite::config::OptimizerConfig;
use quartzite::optimizer::OptimizerContext;
use quartzite::stat::{ColumnStatistics, MemoryStatsProvider, Statistics};

/// * `orders(id, customer_id, amount, status)`: handle `id`, indexes `idx_customer(customer_id)`,
///   `idx_amount(amount)`. `amount` is not null.
/// * `customers(id, name, region)`: handle `id`, index `idx_region(region)`.
pub fn create_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.register_table(
        TableMeta::new(
            "orders",
            Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("customer_id", DataType::Int64, true),
                Field::new("amount", DataType::Int64, false),
                Field::new("status", DataType::Utf8, true),
            ]),
        )
        .with_handle("id")
        .with_index(IndexDescriptor::new(
            "idx_customer",
            vec![IndexColumn::new("customer_id")],
            false,
        ))
        .with_index(IndexDescriptor::new(
            "idx_amount",
            vec![IndexColumn::new("amount")],
            false,
        )),
    );
    catalog.register_table(
        TableMeta::new(
            "customers",
            Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("name", DataType::Utf8, true),
                Field::new("region", DataType::Utf8, true),
            ]),
        )
        .with_handle("id")
        .with_index(IndexDescriptor::new(
            "idx_region",
            vec![IndexColumn::new("region")],
            false,
        )),
    );
    catalog
}

pub fn create_stats() -> MemoryStatsProvider {
    MemoryStatsProvider::new()
        .with_table(
            "orders",
            Statistics::new(100000.0)
                .with_column("customer_id", ColumnStatistics::new(10000.0, 0.0))
                .with_column("amount", ColumnStatistics::new(5000.0, 0.0)),
        )
        .with_table(
            "customers",
            Statistics::new(10000.0).with_column("region", ColumnStatistics::new(20.0, 0.0)),
        )
}

pub fn create_context(config: OptimizerConfig) -> OptimizerContext {
    OptimizerContext::new(Arc::new(create_catalog()), Arc::new(create_stats())).with_config(config)
}
