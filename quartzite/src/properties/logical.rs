use std::sync::Arc;

use datafusion_common::{Column, DFSchema, DFSchemaRef};

#[derive(Clone, PartialEq, Debug)]
pub struct LogicalProperty {
    schema: DFSchemaRef,
}

impl LogicalProperty {
    pub fn new(schema: DFSchema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &DFSchema {
        &self.schema
    }

    pub fn schema_ref(&self) -> DFSchemaRef {
        self.schema.clone()
    }

    pub fn contains_column(&self, column: &Column) -> bool {
        self.schema.index_of_column(column).is_ok()
    }

    /// Output columns in schema order.
    pub fn columns(&self) -> Vec<Column> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.qualified_column())
            .collect()
    }
}
