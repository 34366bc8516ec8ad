//! Cost model.

use std::fmt::Debug;
use std::sync::Arc;

use crate::operators::physical::PhysicalOp;
use crate::statistics::TableStatistics;

pub mod simple;

/// The cost of a plan. Costs are additive up the plan tree.
pub type Cost = f64;

/// Cost of producing a single tuple.
pub const TUPLE_COST: Cost = 0.01;
/// Cost of touching a single index entry.
pub const INDEX_TUPLE_COST: Cost = 0.005;
/// Cost of starting an operator that does almost no per-tuple work.
pub const OPERATOR_COST: Cost = 0.0025;

/// Estimates the local cost of a physical expression, excluding the costs of its inputs.
pub trait CostEstimator: Debug {
    /// Estimates the cost of the given physical operator.
    fn estimate_cost(&self, expr: &PhysicalOp, ctx: &CostEstimationContext) -> Cost;
}

/// Provides the statistics a cost formula can draw on.
#[derive(Debug)]
pub struct CostEstimationContext {
    pub(crate) inputs: Vec<Arc<TableStatistics>>,
    pub(crate) base_statistics: Option<Arc<TableStatistics>>,
}

impl CostEstimationContext {
    /// Statistics of the rows produced by the i-th input.
    pub fn input_statistics(&self, i: usize) -> Option<&TableStatistics> {
        self.inputs.get(i).map(|s| s.as_ref())
    }

    /// The number of rows produced by the i-th input, `0` when unknown.
    pub fn input_rows(&self, i: usize) -> f64 {
        self.input_statistics(i).map(|s| s.num_rows()).unwrap_or(0.0)
    }

    /// Statistics of the base table, present for scan operators only.
    pub fn base_statistics(&self) -> Option<&TableStatistics> {
        self.base_statistics.as_deref()
    }
}
