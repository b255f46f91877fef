use crate::properties::{OrderSpec, PhysicalProp};

/// All physical properties.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct PhysicalPropertySet {
    orders: OrderSpec,
}

impl PhysicalPropertySet {
    pub fn new(orders: OrderSpec) -> Self {
        Self { orders }
    }

    pub fn orders(&self) -> &OrderSpec {
        &self.orders
    }
}

impl PhysicalProp for PhysicalPropertySet {
    fn satisfies(&self, required: &Self) -> bool {
        self.orders.satisfies(&required.orders)
    }
}
