use std::fmt::{Display, Formatter};

use datafusion_common::Column;
use itertools::Itertools;

use crate::properties::PhysicalProp;

/// Ordering of one column.
///
/// NULL sorts lowest, so an ascending ordering puts NULLs first.
#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct Ordering {
    column: Column,
    /// Ascending or descending.
    asc: bool,
    /// Should null be treated first.
    null_first: bool,
}

impl Ordering {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            asc: true,
            null_first: true,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            asc: false,
            null_first: false,
        }
    }

    pub fn new(column: Column, asc: bool) -> Self {
        if asc {
            Self::asc(column)
        } else {
            Self::desc(column)
        }
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn is_asc(&self) -> bool {
        self.asc
    }

    pub fn null_first(&self) -> bool {
        self.null_first
    }

    pub fn with_column(&self, column: Column) -> Self {
        Self {
            column,
            asc: self.asc,
            null_first: self.null_first,
        }
    }
}

impl Display for Ordering {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column)?;
        if !self.asc {
            write!(f, " DESC")?;
        }
        Ok(())
    }
}

/// Ordering property specification.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct OrderSpec {
    orders: Vec<Ordering>,
}

impl OrderSpec {
    pub fn new<I: IntoIterator<Item = Ordering>>(orders: I) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    pub fn orders(&self) -> &[Ordering] {
        &self.orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.orders.iter().map(|o| &o.column)
    }

    /// Whether every ordering has same direction, `Some(asc)` if so.
    pub fn uniform_direction(&self) -> Option<bool> {
        let first = self.orders.first()?.asc;
        self.orders.iter().all(|o| o.asc == first).then_some(first)
    }
}

impl PhysicalProp for OrderSpec {
    /// Data sorted by `self` is also sorted by every prefix of it.
    fn satisfies(&self, required: &Self) -> bool {
        required.orders.len() <= self.orders.len()
            && self.orders.iter().zip(required.orders.iter()).all(|(a, b)| a == b)
    }
}

impl Display for OrderSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.orders.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use datafusion_common::Column;

    use crate::properties::{OrderSpec, Ordering, PhysicalProp};

    fn column(name: &str) -> Column {
        Column::from_qualified_name(name)
    }

    #[test]
    fn test_satisfies_prefix() {
        let provided = OrderSpec::new(vec![
            Ordering::asc(column("t.a")),
            Ordering::asc(column("t.b")),
        ]);

        assert!(provided.satisfies(&OrderSpec::default()));
        assert!(provided.satisfies(&OrderSpec::new(vec![Ordering::asc(column("t.a"))])));
        assert!(!provided.satisfies(&OrderSpec::new(vec![Ordering::asc(column("t.b"))])));
        assert!(!provided.satisfies(&OrderSpec::new(vec![Ordering::desc(column("t.a"))])));
        assert!(!OrderSpec::default().satisfies(&provided));
    }

    #[test]
    fn test_display() {
        let order = OrderSpec::new(vec![
            Ordering::desc(column("t.a")),
            Ordering::asc(column("t.b")),
        ]);
        assert_eq!("[t.a DESC, t.b]", order.to_string());
        assert_eq!(None, order.uniform_direction());
    }
}
