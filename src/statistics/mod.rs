//! Statistics used for cardinality estimation.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::OptimizerError;
use crate::operators::scalar::{
    column_pair_equality, column_value_comparison, AnnotatedExpr, BinaryOp, ScalarExpr, ScalarExprRef,
};
use crate::operators::logical::LogicalOp;
use crate::operators::Operator;

/// The estimated number of rows returned by an operator.
pub type RowCount = f64;

/// The portion of rows that match a predicate. The valid range of selectivity is `[0.0; 1.0]`.
pub type Selectivity = f64;

/// Selectivity of a range comparison over a column that has statistics.
pub const DEFAULT_RANGE_SELECTIVITY: Selectivity = 0.3;

/// Per-column statistics. A cardinality of `0` means "no information".
#[derive(Debug, Clone, Default)]
pub struct ColumnStatistics {
    cardinality: f64,
    has_primary_index: bool,
}

impl ColumnStatistics {
    /// Creates statistics with the given number of distinct values.
    pub fn new(cardinality: f64) -> Self {
        ColumnStatistics {
            cardinality,
            has_primary_index: false,
        }
    }

    /// Marks the column as covered by the primary index of its table.
    pub fn with_primary_index(mut self) -> Self {
        self.has_primary_index = true;
        self
    }

    /// The number of distinct values of the column.
    pub fn cardinality(&self) -> f64 {
        self.cardinality
    }

    /// Returns `true` if the column is covered by the primary index of its table.
    pub fn has_primary_index(&self) -> bool {
        self.has_primary_index
    }
}

/// Statistics of a table or of the rows produced by an operator.
#[derive(Debug, Clone, Default)]
pub struct TableStatistics {
    num_rows: RowCount,
    columns: HashMap<String, ColumnStatistics>,
}

impl TableStatistics {
    /// Creates statistics with the given row count and no column statistics.
    pub fn new(num_rows: RowCount) -> Self {
        TableStatistics {
            num_rows,
            columns: HashMap::new(),
        }
    }

    /// Adds statistics for the column with the given name.
    pub fn add_column(mut self, name: &str, statistics: ColumnStatistics) -> Self {
        self.columns.insert(name.into(), statistics);
        self
    }

    /// The estimated number of rows.
    pub fn num_rows(&self) -> RowCount {
        self.num_rows
    }

    /// Returns `true` if there are statistics for the column with the given name.
    pub fn has_column_stats(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// The number of distinct values of the given column. Returns `0` when the column
    /// has no statistics ("no information").
    pub fn cardinality(&self, name: &str) -> f64 {
        self.columns.get(name).map(|c| c.cardinality()).unwrap_or(0.0)
    }

    /// Returns `true` if the given column is covered by the primary index of its table.
    pub fn has_primary_index(&self, name: &str) -> bool {
        self.columns.get(name).map(|c| c.has_primary_index()).unwrap_or(false)
    }

    /// Statistics of the given column.
    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns.get(name)
    }

    /// All column statistics.
    pub fn columns(&self) -> &HashMap<String, ColumnStatistics> {
        &self.columns
    }

    /// Returns a copy of these statistics with the row count replaced.
    pub fn with_num_rows(&self, num_rows: RowCount) -> TableStatistics {
        TableStatistics {
            num_rows,
            columns: self.columns.clone(),
        }
    }
}

/// Provides statistics for base tables.
pub trait StatisticsProvider: Debug {
    /// Returns statistics of the table with the given name.
    fn table_statistics(&self, table: &str) -> Option<Arc<TableStatistics>>;
}

/// A provider that has no statistics. Every cost formula degrades to its default.
#[derive(Debug)]
pub struct NoStatistics;

impl StatisticsProvider for NoStatistics {
    fn table_statistics(&self, _table: &str) -> Option<Arc<TableStatistics>> {
        None
    }
}

/// Looks up column statistics by the qualified name `alias.name`, falling back to the
/// bare column name for base-table statistics.
pub(crate) fn lookup_column<'a>(
    statistics: &'a TableStatistics,
    alias: &str,
    name: &str,
) -> Option<&'a ColumnStatistics> {
    statistics
        .column(&format!("{}.{}", alias, name))
        .or_else(|| statistics.column(name))
}

/// Estimates the fraction of rows that satisfy all the given predicates.
/// A predicate over a column without statistics does not filter (selectivity `1`).
pub fn predicates_selectivity(predicates: &[AnnotatedExpr], statistics: &TableStatistics) -> Selectivity {
    predicates.iter().map(|p| expr_selectivity(&p.expr, statistics)).product()
}

fn expr_selectivity(expr: &ScalarExpr, statistics: &TableStatistics) -> Selectivity {
    if let ScalarExpr::Binary { lhs, op, rhs } = expr {
        match op {
            BinaryOp::And => return expr_selectivity(lhs, statistics) * expr_selectivity(rhs, statistics),
            BinaryOp::Or => {
                let lhs = expr_selectivity(lhs, statistics);
                let rhs = expr_selectivity(rhs, statistics);
                return lhs + rhs - lhs * rhs;
            }
            _ => {}
        }
    }
    if let Some((alias, name, op, _)) = column_value_comparison(expr) {
        match lookup_column(statistics, alias, name) {
            Some(column) if column.cardinality() > 0.0 => match op {
                BinaryOp::Eq => 1.0 / column.cardinality(),
                BinaryOp::NotEq => 1.0 - 1.0 / column.cardinality(),
                _ => DEFAULT_RANGE_SELECTIVITY,
            },
            _ => 1.0,
        }
    } else {
        1.0
    }
}

/// Derives the statistics of the rows produced by the given logical operator from the
/// statistics of its inputs. Called by the memo when group statistics are first requested.
pub(crate) fn derive_operator_statistics(
    operator: &Operator,
    children: &[Arc<TableStatistics>],
    provider: &dyn StatisticsProvider,
) -> Result<TableStatistics, OptimizerError> {
    let expr = operator.logical()?;
    let statistics = match expr {
        LogicalOp::Get(get) => match &get.table {
            Some(table) => {
                let base = provider.table_statistics(table).unwrap_or_default_stats();
                let qualified = qualify_columns(&base, &get.alias);
                let selectivity = predicates_selectivity(&get.predicates, &qualified);
                qualified.with_num_rows(qualified.num_rows() * selectivity)
            }
            None => TableStatistics::new(0.0),
        },
        LogicalOp::Filter(filter) => {
            let input = input_stats(children, 0)?;
            let selectivity = predicates_selectivity(&filter.predicates, input);
            input.with_num_rows(input.num_rows() * selectivity)
        }
        LogicalOp::InnerJoin(join) => {
            let left = input_stats(children, 0)?;
            let right = input_stats(children, 1)?;
            join_output_statistics(left, right, &join.predicates)
        }
        LogicalOp::GroupBy(group_by) => {
            let input = input_stats(children, 0)?;
            input.with_num_rows(group_by_output_rows(input, &group_by.columns))
        }
        LogicalOp::Aggregate(_) => {
            let input = input_stats(children, 0)?;
            input.with_num_rows(1.0)
        }
        LogicalOp::Distinct(distinct) => {
            let input = input_stats(children, 0)?;
            input.with_num_rows(distinct_output_rows(input, &distinct.columns))
        }
        LogicalOp::Limit(limit) => {
            let input = input_stats(children, 0)?;
            input.with_num_rows(input.num_rows().min(limit.limit as f64))
        }
        LogicalOp::QueryDerivedGet(_) | LogicalOp::InsertSelect(_) | LogicalOp::Update(_) | LogicalOp::Delete(_) => {
            let input = input_stats(children, 0)?;
            input.clone()
        }
        LogicalOp::Insert(insert) => TableStatistics::new(insert.values.len() as f64),
        LogicalOp::Leaf(_) => {
            return Err(OptimizerError::internal("Statistics can not be derived for a leaf operator"))
        }
    };
    Ok(statistics)
}

trait OrDefaultStats {
    fn unwrap_or_default_stats(self) -> Arc<TableStatistics>;
}

impl OrDefaultStats for Option<Arc<TableStatistics>> {
    fn unwrap_or_default_stats(self) -> Arc<TableStatistics> {
        self.unwrap_or_else(|| Arc::new(TableStatistics::new(0.0)))
    }
}

fn input_stats<'a>(children: &'a [Arc<TableStatistics>], i: usize) -> Result<&'a TableStatistics, OptimizerError> {
    children
        .get(i)
        .map(|s| s.as_ref())
        .ok_or_else(|| OptimizerError::internal(format!("No statistics for input {}", i)))
}

/// Re-keys base-table column statistics by `alias.name` so that operators above the scan
/// can resolve column references from predicates.
fn qualify_columns(base: &TableStatistics, alias: &str) -> TableStatistics {
    let mut statistics = TableStatistics::new(base.num_rows());
    for (name, column) in base.columns() {
        statistics = statistics.add_column(&format!("{}.{}", alias, name), column.clone());
    }
    statistics
}

/// Estimates the output of an inner join:
///
/// * equality on a column covered by a primary index: `min(left_rows, right_rows)`;
/// * equality on plain columns: `left_rows * right_rows / sqrt(card_left * card_right)`;
/// * anything else degrades to the cartesian size.
///
/// Each column of the equality is looked up strictly on its own side.
fn join_output_statistics(
    left: &TableStatistics,
    right: &TableStatistics,
    predicates: &[AnnotatedExpr],
) -> TableStatistics {
    let cartesian = left.num_rows() * right.num_rows();
    let mut num_rows = cartesian;

    for predicate in predicates {
        let columns = match column_pair_equality(&predicate.expr) {
            Some(columns) => columns,
            None => continue,
        };
        // Orient the pair so that the first column belongs to the left input.
        let ((l_alias, l_name), (r_alias, r_name)) = columns;
        let (left_column, right_column) = if lookup_column(left, l_alias, l_name).is_some() {
            ((l_alias, l_name), (r_alias, r_name))
        } else {
            ((r_alias, r_name), (l_alias, l_name))
        };

        let left_stats = lookup_column(left, left_column.0, left_column.1);
        let right_stats = lookup_column(right, right_column.0, right_column.1);

        let primary_key = left_stats.map(|c| c.has_primary_index()).unwrap_or(false)
            || right_stats.map(|c| c.has_primary_index()).unwrap_or(false);
        if primary_key {
            num_rows = left.num_rows().min(right.num_rows());
        } else {
            let left_cardinality = left_stats.map(|c| c.cardinality()).unwrap_or(0.0);
            let right_cardinality = right_stats.map(|c| c.cardinality()).unwrap_or(0.0);
            if left_cardinality > 0.0 && right_cardinality > 0.0 {
                num_rows = cartesian / (left_cardinality * right_cardinality).sqrt();
            }
        }
        break;
    }

    let mut output = TableStatistics::new(num_rows);
    for (name, column) in left.columns().iter().chain(right.columns().iter()) {
        output = output.add_column(name, column.clone());
    }
    output
}

/// Estimates the number of groups produced by grouping on the given columns:
/// the product of the column cardinalities plus half of the largest one.
/// Degrades to the input row count when no grouping column has statistics.
fn group_by_output_rows(input: &TableStatistics, columns: &[ScalarExprRef]) -> RowCount {
    let mut rows = 1.0;
    let mut max_cardinality = 0.0f64;
    let mut any_stats = false;

    for column in columns {
        let cardinality = match column.as_column().and_then(|(alias, name)| lookup_column(input, alias, name)) {
            Some(stats) if stats.cardinality() > 0.0 => {
                any_stats = true;
                stats.cardinality()
            }
            _ => continue,
        };
        max_cardinality = max_cardinality.max(cardinality);
        rows *= cardinality;
    }

    if any_stats {
        (rows + max_cardinality / 2.0).min(input.num_rows())
    } else {
        input.num_rows()
    }
}

/// Output rows of a distinct operator: the cardinality of the distinct column.
fn distinct_output_rows(input: &TableStatistics, columns: &[ScalarExprRef]) -> RowCount {
    let cardinality = columns
        .first()
        .and_then(|c| c.as_column())
        .and_then(|(alias, name)| lookup_column(input, alias, name))
        .map(|c| c.cardinality())
        .unwrap_or(0.0);
    if cardinality > 0.0 {
        cardinality.min(input.num_rows())
    } else {
        input.num_rows()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::operators::scalar::ScalarValue;

    fn table_stats(rows: f64) -> TableStatistics {
        TableStatistics::new(rows)
            .add_column("a.a1", ColumnStatistics::new(100.0).with_primary_index())
            .add_column("a.a2", ColumnStatistics::new(10.0))
    }

    fn eq_pred(lhs: ScalarExprRef, rhs: ScalarExprRef) -> AnnotatedExpr {
        AnnotatedExpr::new(ScalarExpr::binary(lhs, BinaryOp::Eq, rhs))
    }

    #[test]
    fn test_equality_selectivity() {
        let stats = table_stats(1000.0);
        let pred = eq_pred(ScalarExpr::column("a", "a2"), ScalarExpr::value(ScalarValue::Int32(1)));

        let selectivity = predicates_selectivity(&[pred], &stats);
        assert!((selectivity - 0.1).abs() < 1e-9, "1/cardinality, got {}", selectivity);
    }

    #[test]
    fn test_selectivity_without_statistics_defaults_to_one() {
        let stats = TableStatistics::new(1000.0);
        let pred = eq_pred(ScalarExpr::column("a", "a2"), ScalarExpr::value(ScalarValue::Int32(1)));

        assert_eq!(predicates_selectivity(&[pred], &stats), 1.0);
    }

    #[test]
    fn test_range_selectivity() {
        let stats = table_stats(1000.0);
        let pred = AnnotatedExpr::new(ScalarExpr::binary(
            ScalarExpr::column("a", "a2"),
            BinaryOp::Gt,
            ScalarExpr::value(ScalarValue::Int32(5)),
        ));

        assert_eq!(predicates_selectivity(&[pred], &stats), DEFAULT_RANGE_SELECTIVITY);
    }

    #[test]
    fn test_join_output_primary_key() {
        let left = table_stats(1000.0);
        let right = TableStatistics::new(50.0).add_column("b.b1", ColumnStatistics::new(50.0));
        let pred = eq_pred(ScalarExpr::column("a", "a1"), ScalarExpr::column("b", "b1"));

        let output = join_output_statistics(&left, &right, &[pred]);
        assert_eq!(output.num_rows(), 50.0, "min of the two sides");
    }

    #[test]
    fn test_join_output_by_cardinality() {
        let left = TableStatistics::new(100.0).add_column("a.a2", ColumnStatistics::new(4.0));
        let right = TableStatistics::new(100.0).add_column("b.b1", ColumnStatistics::new(9.0));
        let pred = eq_pred(ScalarExpr::column("a", "a2"), ScalarExpr::column("b", "b1"));

        let output = join_output_statistics(&left, &right, &[pred]);
        // 100 * 100 / sqrt(4 * 9)
        assert!((output.num_rows() - 10000.0 / 6.0).abs() < 1e-9, "got {}", output.num_rows());
    }

    #[test]
    fn test_join_output_without_statistics_is_cartesian() {
        let left = TableStatistics::new(100.0);
        let right = TableStatistics::new(20.0);
        let pred = eq_pred(ScalarExpr::column("a", "a1"), ScalarExpr::column("b", "b1"));

        let output = join_output_statistics(&left, &right, &[pred]);
        assert_eq!(output.num_rows(), 2000.0);

        let output = join_output_statistics(&left, &right, &[]);
        assert_eq!(output.num_rows(), 2000.0, "no predicates");
    }

    #[test]
    fn test_group_by_output_rows() {
        let input = TableStatistics::new(10000.0)
            .add_column("a.a1", ColumnStatistics::new(10.0))
            .add_column("a.a2", ColumnStatistics::new(4.0));

        let columns = vec![ScalarExpr::column("a", "a1"), ScalarExpr::column("a", "a2")];
        let rows = group_by_output_rows(&input, &columns);
        // 10 * 4 + 10 / 2
        assert_eq!(rows, 45.0);

        let unknown = vec![ScalarExpr::column("a", "a9")];
        assert_eq!(group_by_output_rows(&input, &unknown), 10000.0, "no statistics");
    }
}
