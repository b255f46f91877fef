//! Frozen schema snapshot consumed by the optimizer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};

/// One column of an index, optionally with a prefix length for string columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    pub prefix_len: Option<usize>,
}

impl IndexColumn {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            prefix_len: None,
        }
    }

    pub fn with_prefix<S: Into<String>>(name: S, prefix_len: usize) -> Self {
        Self {
            name: name.into(),
            prefix_len: Some(prefix_len),
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new<S: Into<String>, I: IntoIterator<Item = IndexColumn>>(
        name: S,
        columns: I,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().collect(),
            unique,
        }
    }

    /// Whether reading this index alone yields every column in `needed`.
    ///
    /// Prefix columns never cover since they store a truncated value. The integer handle is
    /// always carried by an index entry.
    pub fn covers(&self, needed: &HashSet<String>, handle: Option<&str>) -> bool {
        needed.iter().all(|c| {
            handle == Some(c.as_str())
                || self
                    .columns
                    .iter()
                    .any(|ic| ic.prefix_len.is_none() && &ic.name == c)
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Table metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct TableMeta {
    name: String,
    schema: SchemaRef,
    indexes: Vec<IndexDescriptor>,
    /// Integer primary key column used as row handle. Table scans are ordered by it.
    handle: Option<String>,
}

impl TableMeta {
    pub fn new<S: Into<String>>(name: S, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema),
            indexes: vec![],
            handle: None,
        }
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_handle<S: Into<String>>(mut self, column: S) -> Self {
        self.handle = Some(column.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes
            .iter()
            .find(|idx| idx.name.eq_ignore_ascii_case(name))
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn field(&self, column: &str) -> Option<&Field> {
        self.schema
            .fields()
            .iter()
            .find(|f| f.name() == column)
            .map(|f| f.as_ref())
    }

    pub fn data_type(&self, column: &str) -> Option<&DataType> {
        self.field(column).map(|f| f.data_type())
    }

    pub fn is_nullable(&self, column: &str) -> bool {
        self.field(column).map(|f| f.is_nullable()).unwrap_or(true)
    }
}

/// Read only catalog access.
pub trait Catalog: Send + Sync {
    fn table(&self, name: &str) -> Option<Arc<TableMeta>>;
}

#[derive(Default, Debug, Clone)]
pub struct MemoryCatalog {
    tables: HashMap<String, Arc<TableMeta>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_table(&mut self, table: TableMeta) {
        self.tables.insert(table.name.clone(), Arc::new(table));
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, name: &str) -> Option<Arc<TableMeta>> {
        self.tables.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{IndexColumn, IndexDescriptor};
    use maplit::hashset;

    #[test]
    fn test_index_covers() {
        let idx = IndexDescriptor::new(
            "idx_ab",
            vec![IndexColumn::new("a"), IndexColumn::with_prefix("b", 4)],
            false,
        );

        assert!(idx.covers(&hashset! {"a".to_string()}, None));
        assert!(idx.covers(&hashset! {"a".to_string(), "id".to_string()}, Some("id")));
        assert!(!idx.covers(&hashset! {"b".to_string()}, None));
        assert!(!idx.covers(&hashset! {"c".to_string()}, Some("id")));
    }
}
