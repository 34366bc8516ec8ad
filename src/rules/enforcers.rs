//! Property enforcement.
//!
//! When the chosen implementation of a group does not produce a required property, the
//! optimizer inserts an enforcer operator into the same group. Enforced expressions are
//! kept out of rule exploration, otherwise an enforcer over a group would trigger the
//! optimization of that same group and the search would never terminate.

use crate::error::OptimizerError;
use crate::memo::GroupId;
use crate::operators::physical::{PhysicalOp, PhysicalSort};
use crate::operators::OperatorExpr;
use crate::properties::Property;

/// Returns `true` if an enforcer operator exists for the given property.
/// Only sort orders can be enforced.
pub fn can_enforce(property: &Property) -> bool {
    matches!(property, Property::Sort(_))
}

/// Builds an enforcer expression for the given property over the given group.
pub fn create_enforcer(property: &Property, input: GroupId) -> Result<OperatorExpr, OptimizerError> {
    match property {
        Property::Sort(sort) => {
            let sort = PhysicalOp::Sort(PhysicalSort { sort: sort.clone() });
            Ok(OperatorExpr::new(sort, vec![OperatorExpr::leaf(input)]))
        }
        _ => Err(OptimizerError::Unsupported(format!("Property can not be enforced: {}", property))),
    }
}
