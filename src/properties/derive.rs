//! Derivation of child input properties.
//!
//! Given a physical operator and the properties required from its output, the deriver
//! produces the `(output_properties, input_properties_per_child)` pairs the operator can
//! satisfy. The search costs one pair at a time; properties required but absent from the
//! chosen output set are added by the enforcer afterwards.

use crate::operators::physical::PhysicalOp;
use crate::properties::{Property, PropertyKind, PropertySet};

/// Returns the property pairs the given operator can satisfy. Every operator yields at
/// least one pair; input property sets always match the number of children.
pub fn derive_child_properties(
    operator: &PhysicalOp,
    num_children: usize,
    required: &PropertySet,
) -> Vec<(PropertySet, Vec<PropertySet>)> {
    let mut output = PropertySet::new();

    // Output columns are decided by the binder, any implementation produces them.
    if let Some(columns @ Property::Columns(_)) = required.get(PropertyKind::Columns) {
        output.add(columns.clone());
    }

    match operator {
        PhysicalOp::IndexScan(scan) => {
            // An index scan satisfies a required ordering that is a prefix of the
            // traversal order of its index.
            if let (Some(required_sort), Some(ordering)) = (required.sort(), scan.ordering.as_ref()) {
                if required_sort.prefix_of(ordering) {
                    output.add(Property::Sort(required_sort.clone()));
                }
            }
        }
        PhysicalOp::Sort(sort) => {
            output.add(Property::Sort(sort.sort.clone()));
        }
        PhysicalOp::HashGroupBy(group_by) => {
            // Grouping produces one row per distinct combination of the grouping columns.
            output.add(Property::Distinct(group_by.columns.clone()));
        }
        PhysicalOp::Distinct(distinct) => {
            output.add(Property::Distinct(distinct.columns.clone()));
        }
        PhysicalOp::Limit(limit) => {
            output.add(Property::Limit {
                offset: limit.offset,
                limit: limit.limit,
            });
        }
        // Joins provide no ordering guarantee and place no requirements on their inputs.
        // Scans and the remaining operators produce unordered rows.
        _ => {}
    }

    vec![(output, vec![PropertySet::new(); num_children])]
}
