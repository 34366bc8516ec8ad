//! Test utilities.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Once};

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::catalog::mutable::MutableCatalog;
use crate::catalog::{Catalog, CatalogRef, IndexBuilder, TableBuilder};
use crate::cost::simple::SimpleCostEstimator;
use crate::datatypes::DataType;
use crate::error::OptimizerError;
use crate::memo::Memo;
use crate::operators::logical::{
    LogicalDelete, LogicalDistinct, LogicalFilter, LogicalGet, LogicalGroupBy, LogicalInnerJoin, LogicalLimit,
    LogicalOp,
};
use crate::operators::scalar::{AnnotatedExpr, BinaryOp, ScalarExpr, ScalarExprRef, ScalarValue};
use crate::operators::OperatorExpr;
use crate::optimizer::{Optimizer, PhysicalPlan};
use crate::properties::{Property, PropertySet, SortSpec};
use crate::rules::{rewrite_rules, standard_rules, Rule, StaticRuleSet};
use crate::statistics::{ColumnStatistics, StatisticsProvider, TableStatistics};

static INIT_LOG: Once = Once::new();

/// Provides a test setup for the [optimizer](crate::optimizer::Optimizer): a catalog with
/// tables `A(a1, a2)`, `B(b1, b2)` and `C(c1, c2)` registered under the aliases
/// `a`, `b` and `c`, adjustable statistics and the built-in rule catalog.
pub struct OptimizerTester {
    catalog: Arc<MutableCatalog>,
    row_counts: HashMap<String, f64>,
    columns: HashMap<String, Vec<(String, f64, bool)>>,
    required_properties: PropertySet,
    shuffle_rules: bool,
}

impl OptimizerTester {
    pub fn new() -> Self {
        INIT_LOG.call_once(pretty_env_logger::init);

        let catalog = MutableCatalog::new();
        for (table, columns) in [("A", ["a1", "a2"]), ("B", ["b1", "b2"]), ("C", ["c1", "c2"])] {
            let mut builder = TableBuilder::new(table);
            for column in columns {
                builder = builder.add_column(column, DataType::Int32);
            }
            catalog.add_table(builder.build().expect("invalid test table"));
        }

        OptimizerTester {
            catalog: Arc::new(catalog),
            row_counts: HashMap::new(),
            columns: HashMap::new(),
            required_properties: PropertySet::new(),
            shuffle_rules: false,
        }
    }

    pub fn catalog(&self) -> CatalogRef {
        self.catalog.clone()
    }

    /// Registers an index over the given columns of a table.
    pub fn add_index(&self, table: &str, name: &str, columns: &[&str], primary: bool) {
        let table = self.catalog.get_table(table).expect("unknown test table");
        let mut builder = IndexBuilder::new(table, name);
        for column in columns {
            builder = builder.add_column(column);
        }
        if primary {
            builder = builder.primary();
        }
        self.catalog.add_index(builder.build().expect("invalid test index"));
    }

    /// Sets the number of rows of a table.
    pub fn set_row_count(&mut self, table: &str, rows: f64) {
        self.row_counts.insert(table.into(), rows);
    }

    /// Sets the cardinality of a column.
    pub fn set_cardinality(&mut self, table: &str, column: &str, cardinality: f64) {
        self.set_column_statistics(table, column, cardinality, false);
    }

    /// Sets the cardinality of a column covered by the primary index of its table.
    pub fn set_primary_column(&mut self, table: &str, column: &str, cardinality: f64) {
        self.set_column_statistics(table, column, cardinality, true);
    }

    fn set_column_statistics(&mut self, table: &str, column: &str, cardinality: f64, primary: bool) {
        self.columns
            .entry(table.into())
            .or_default()
            .push((column.into(), cardinality, primary));
    }

    /// Sets the properties required from the optimized plan.
    pub fn require(&mut self, properties: PropertySet) {
        self.required_properties = properties;
    }

    /// A toggle to randomize the order of the rule catalog. The chosen plan must not
    /// depend on the order rules are enumerated in.
    pub fn shuffle_rules(&mut self, value: bool) {
        self.shuffle_rules = value;
    }

    /// Optimizes the given operator tree with a fresh memo.
    pub fn optimize(&self, expr: &OperatorExpr) -> Result<PhysicalPlan, OptimizerError> {
        let mut memo = Memo::new();
        self.optimize_with_memo(expr, &mut memo)
    }

    /// Optimizes the given operator tree reusing the given memo.
    pub fn optimize_with_memo(&self, expr: &OperatorExpr, memo: &mut Memo) -> Result<PhysicalPlan, OptimizerError> {
        self.register_statistics();

        let mut rules = standard_rules(self.catalog());
        if self.shuffle_rules {
            rules.shuffle(&mut thread_rng());
        }
        let optimizer = self.build_optimizer(rules)?;
        optimizer.optimize(expr, self.required_properties.clone(), memo)
    }

    /// Optimizes the given operator tree and compares the result with the expected plan.
    pub fn expect_plan(&self, expr: &OperatorExpr, expected: &str) -> PhysicalPlan {
        let plan = self.optimize(expr).expect("failed to optimize the operator tree");
        assert_eq!(format!("{}", plan), expected.trim(), "plan does not match");
        plan
    }

    fn build_optimizer(&self, rules: Vec<Box<dyn Rule>>) -> Result<Optimizer<SimpleCostEstimator>, OptimizerError> {
        let rule_set = Rc::new(StaticRuleSet::new(rules)?);
        let rewrite_rule_set = Rc::new(StaticRuleSet::new(rewrite_rules())?);
        let statistics: Arc<dyn StatisticsProvider> = self.catalog.clone();
        Ok(Optimizer::new(rule_set, rewrite_rule_set, Rc::new(SimpleCostEstimator::new()), statistics))
    }

    fn register_statistics(&self) {
        for (table, rows) in self.row_counts.iter() {
            let mut statistics = TableStatistics::new(*rows);
            if let Some(columns) = self.columns.get(table) {
                for (column, cardinality, primary) in columns {
                    let mut column_statistics = ColumnStatistics::new(*cardinality);
                    if *primary {
                        column_statistics = column_statistics.with_primary_index();
                    }
                    statistics = statistics.add_column(column, column_statistics);
                }
            }
            self.catalog.set_statistics(table, statistics);
        }
    }
}

// Operator tree builders used across the test suite.

pub fn table_get(table: &str, alias: &str) -> OperatorExpr {
    OperatorExpr::from(LogicalOp::Get(LogicalGet {
        table: Some(table.into()),
        alias: alias.into(),
        predicates: vec![],
    }))
}

pub fn col(alias: &str, name: &str) -> ScalarExprRef {
    ScalarExpr::column(alias, name)
}

pub fn int(value: i32) -> ScalarExprRef {
    ScalarExpr::value(ScalarValue::Int32(value))
}

pub fn cmp(lhs: ScalarExprRef, op: BinaryOp, rhs: ScalarExprRef) -> AnnotatedExpr {
    AnnotatedExpr::new(ScalarExpr::binary(lhs, op, rhs))
}

pub fn filter(predicates: Vec<AnnotatedExpr>, input: OperatorExpr) -> OperatorExpr {
    OperatorExpr::new(LogicalOp::Filter(LogicalFilter { predicates }), vec![input])
}

pub fn inner_join(predicates: Vec<AnnotatedExpr>, left: OperatorExpr, right: OperatorExpr) -> OperatorExpr {
    OperatorExpr::new(LogicalOp::InnerJoin(LogicalInnerJoin { predicates }), vec![left, right])
}

pub fn group_by(columns: Vec<ScalarExprRef>, input: OperatorExpr) -> OperatorExpr {
    OperatorExpr::new(LogicalOp::GroupBy(LogicalGroupBy { columns, having: None }), vec![input])
}

pub fn distinct(columns: Vec<ScalarExprRef>, input: OperatorExpr) -> OperatorExpr {
    OperatorExpr::new(LogicalOp::Distinct(LogicalDistinct { columns }), vec![input])
}

pub fn limit(offset: usize, limit: usize, input: OperatorExpr) -> OperatorExpr {
    OperatorExpr::new(LogicalOp::Limit(LogicalLimit { offset, limit }), vec![input])
}

pub fn delete(table: &str, input: OperatorExpr) -> OperatorExpr {
    OperatorExpr::new(LogicalOp::Delete(LogicalDelete { table: table.into() }), vec![input])
}

/// A required property set with an ascending ordering over the given columns.
pub fn require_ordering(columns: Vec<ScalarExprRef>) -> PropertySet {
    PropertySet::with_property(Property::Sort(SortSpec::ascending(columns)))
}
