//! Default implementation of the cost model.

use std::fmt::{Debug, Formatter};

use crate::cost::{Cost, CostEstimationContext, CostEstimator, INDEX_TUPLE_COST, OPERATOR_COST, TUPLE_COST};
use crate::operators::physical::{PhysicalOp, PhysicalSort};
use crate::statistics::{lookup_column, predicates_selectivity, TableStatistics};

/// A cost model built from per-operator formulas over input statistics.
pub struct SimpleCostEstimator {
    _private: (),
}

impl SimpleCostEstimator {
    pub fn new() -> Self {
        SimpleCostEstimator { _private: () }
    }
}

impl Default for SimpleCostEstimator {
    fn default() -> Self {
        SimpleCostEstimator::new()
    }
}

impl CostEstimator for SimpleCostEstimator {
    fn estimate_cost(&self, expr: &PhysicalOp, ctx: &CostEstimationContext) -> Cost {
        match expr {
            PhysicalOp::DummyScan(_) => 0.0,
            PhysicalOp::SeqScan(_) => {
                let rows = ctx.base_statistics().map(|s| s.num_rows()).unwrap_or(0.0);
                rows * TUPLE_COST
            }
            PhysicalOp::IndexScan(scan) => {
                let rows = ctx.base_statistics().map(|s| s.num_rows()).unwrap_or(0.0);
                let selectivity = ctx
                    .base_statistics()
                    .map(|s| predicates_selectivity(&scan.predicates, s))
                    .unwrap_or(1.0);

                log2(rows) * INDEX_TUPLE_COST + selectivity * rows * TUPLE_COST
            }
            PhysicalOp::NLJoin(_) => ctx.input_rows(0) * ctx.input_rows(1) * TUPLE_COST,
            PhysicalOp::HashJoin(_) => (ctx.input_rows(0) + ctx.input_rows(1)) * TUPLE_COST,
            PhysicalOp::HashGroupBy(_) => ctx.input_rows(0) * TUPLE_COST,
            PhysicalOp::Aggregate(_) => ctx.input_rows(0) * TUPLE_COST,
            PhysicalOp::Distinct(_) => ctx.input_rows(0) * TUPLE_COST,
            PhysicalOp::Limit(limit) => limit.limit as f64 * TUPLE_COST,
            PhysicalOp::Sort(sort) => sort_cost(sort, ctx.input_statistics(0)),
            PhysicalOp::QueryDerivedScan(_) => ctx.input_rows(0) * TUPLE_COST,
            PhysicalOp::Insert(insert) => insert.values.len() as f64 * TUPLE_COST,
            PhysicalOp::InsertSelect(_) | PhysicalOp::Update(_) | PhysicalOp::Delete(_) => {
                ctx.input_rows(0) * TUPLE_COST
            }
        }
    }
}

/// Sorting costs `rows * log2(rows) * TUPLE_COST`. When the input rows are already
/// clustered by the primary index on the first sort column in ascending order the sort
/// collapses to a constant startup cost.
fn sort_cost(sort: &PhysicalSort, input: Option<&TableStatistics>) -> Cost {
    let input = match input {
        Some(input) => input,
        None => return OPERATOR_COST,
    };

    if let Some(first) = sort.sort.columns().first() {
        let clustered = first
            .expr
            .as_column()
            .and_then(|(alias, name)| lookup_column(input, alias, name))
            .map(|column| column.has_primary_index())
            .unwrap_or(false);
        if clustered && first.ascending {
            return OPERATOR_COST;
        }
    }

    let rows = input.num_rows();
    rows * log2(rows) * TUPLE_COST
}

fn log2(rows: f64) -> f64 {
    if rows > 1.0 {
        rows.log2()
    } else {
        0.0
    }
}

impl Debug for SimpleCostEstimator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimpleCostEstimator")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::operators::physical::{PhysicalHashJoin, PhysicalNLJoin, PhysicalSeqScan, PhysicalSort};
    use crate::operators::scalar::ScalarExpr;
    use crate::properties::{SortColumn, SortSpec};
    use crate::statistics::ColumnStatistics;
    use std::sync::Arc;

    fn ctx(inputs: Vec<TableStatistics>, base: Option<TableStatistics>) -> CostEstimationContext {
        CostEstimationContext {
            inputs: inputs.into_iter().map(Arc::new).collect(),
            base_statistics: base.map(Arc::new),
        }
    }

    #[test]
    fn test_seq_scan_cost() {
        let estimator = SimpleCostEstimator::new();
        let scan = PhysicalOp::SeqScan(PhysicalSeqScan {
            table: "A".into(),
            alias: "a".into(),
            predicates: vec![],
        });

        let cost = estimator.estimate_cost(&scan, &ctx(vec![], Some(TableStatistics::new(1000.0))));
        assert_eq!(cost, 1000.0 * TUPLE_COST);
    }

    #[test]
    fn test_join_costs() {
        let estimator = SimpleCostEstimator::new();
        let inputs = ctx(vec![TableStatistics::new(100.0), TableStatistics::new(200.0)], None);

        let nl_join = PhysicalOp::NLJoin(PhysicalNLJoin { predicates: vec![] });
        assert_eq!(estimator.estimate_cost(&nl_join, &inputs), 100.0 * 200.0 * TUPLE_COST);

        let hash_join = PhysicalOp::HashJoin(PhysicalHashJoin { predicates: vec![] });
        assert_eq!(estimator.estimate_cost(&hash_join, &inputs), 300.0 * TUPLE_COST);
    }

    #[test]
    fn test_sort_cost() {
        let estimator = SimpleCostEstimator::new();
        let sort = PhysicalOp::Sort(PhysicalSort {
            sort: SortSpec::new(vec![SortColumn::asc(ScalarExpr::column("a", "a1"))]),
        });

        let input = TableStatistics::new(1024.0);
        let cost = estimator.estimate_cost(&sort, &ctx(vec![input], None));
        assert_eq!(cost, 1024.0 * 10.0 * TUPLE_COST);
    }

    #[test]
    fn test_sort_collapses_on_clustered_input() {
        let estimator = SimpleCostEstimator::new();
        let clustered = TableStatistics::new(1024.0)
            .add_column("a.a1", ColumnStatistics::new(1024.0).with_primary_index());

        let sort = PhysicalOp::Sort(PhysicalSort {
            sort: SortSpec::new(vec![SortColumn::asc(ScalarExpr::column("a", "a1"))]),
        });
        let cost = estimator.estimate_cost(&sort, &ctx(vec![clustered.clone()], None));
        assert_eq!(cost, OPERATOR_COST, "ascending scan over the primary index is free");

        let sort_desc = PhysicalOp::Sort(PhysicalSort {
            sort: SortSpec::new(vec![SortColumn::desc(ScalarExpr::column("a", "a1"))]),
        });
        let cost = estimator.estimate_cost(&sort_desc, &ctx(vec![clustered], None));
        assert_eq!(cost, 1024.0 * 10.0 * TUPLE_COST, "descending order is not provided by the index");
    }
}
