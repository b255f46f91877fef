//! Properties of relation operators.
//!
//! Currently we have two kinds of properties: [`LogicalProperty`] and [`PhysicalPropertySet`].
//! Logical property are things shared by logically equivalent plans, such as schema.
//! Physical properties are concerned with sorting.

use std::fmt::Debug;
use std::hash::Hash;

mod order;
pub use order::*;
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;

pub trait PhysicalProp: Debug + Hash {
    /// Tests whether `self` satisfies `required`.
    fn satisfies(&self, required: &Self) -> bool;
}
