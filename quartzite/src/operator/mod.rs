//! Contains relational operators such as join, projection, limit, etc.
//!
//! Currently they are classified into two categories: logical and physical. We separate logical
//! and physical operators in two enums since they need to implement different traits. Logical
//! operators derive their logical property, physical operators carry the strategy chosen by the
//! physical planner.
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod aggregate;
pub use aggregate::*;
mod dual;
pub use dual::*;
mod filter;
pub use filter::*;
mod join;
pub use join::*;
mod limit;
pub use limit::*;
mod projection;
pub use projection::*;
mod scan;
pub use scan::*;
mod sort;
pub use sort::*;
mod union;
pub use union::*;

use std::fmt::{Debug, Display, Formatter};

use anyhow::{anyhow, bail};
use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use itertools::Itertools;

use crate::error::QuartziteResult;
use crate::operator::Operator::{Logical, Physical};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

#[derive(Clone, Debug, PartialEq, EnumAsInner)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
}

#[enum_dispatch(LogicalOperator)]
pub trait OperatorTrait {
    /// Derives output property from properties of inputs.
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty>;
}

impl OperatorTrait for Operator {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> QuartziteResult<LogicalProperty> {
        match self {
            Logical(op) => op.derive_logical_prop(inputs, context),
            Physical(op) => bail!("Can't derive logical property for {}", op.as_ref()),
        }
    }
}

#[enum_dispatch(LogicalOperator, PhysicalOperator)]
pub trait DisplayFields {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result;
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Logical(op) => write!(f, "{}", op),
            Physical(op) => write!(f, "{}", op),
        }
    }
}

fn input_at<'a>(
    inputs: &[&'a LogicalProperty],
    idx: usize,
) -> QuartziteResult<&'a LogicalProperty> {
    inputs
        .get(idx)
        .copied()
        .ok_or_else(|| anyhow!("Missing input {} of operator", idx))
}

/// Formats items with `Display` inside a debug struct.
pub(crate) struct DisplayList<'a, T>(pub &'a [T]);

impl<'a, T: Display> Debug for DisplayList<'a, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

pub(crate) struct DisplayValue<T>(pub T);

impl<T: Display> Debug for DisplayValue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
