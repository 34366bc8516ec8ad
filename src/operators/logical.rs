//! Logical operators supported by the optimizer.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::memo::GroupId;
use crate::operators::scalar::{format_predicates, AnnotatedExpr, ScalarExprRef};
use crate::operators::OperatorType;

/// A logical operator describes a high-level relational operation without committing to
/// an implementation algorithm. Equality and hashing cover the payload only, child
/// relations are stored on the enclosing expression.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum LogicalOp {
    /// Retrieval from a source table.
    Get(LogicalGet),
    /// Filters rows of its input.
    Filter(LogicalFilter),
    /// Inner join of two inputs.
    InnerJoin(LogicalInnerJoin),
    /// Grouping with optional HAVING predicate.
    GroupBy(LogicalGroupBy),
    /// Aggregation without grouping.
    Aggregate(LogicalAggregate),
    /// Duplicate elimination.
    Distinct(LogicalDistinct),
    /// Limit/offset.
    Limit(LogicalLimit),
    /// Retrieval from a derived table (subquery in FROM).
    QueryDerivedGet(LogicalQueryDerivedGet),
    /// INSERT with literal rows.
    Insert(LogicalInsert),
    /// INSERT from a query.
    InsertSelect(LogicalInsertSelect),
    /// UPDATE.
    Update(LogicalUpdate),
    /// DELETE.
    Delete(LogicalDelete),
    /// A placeholder produced by pattern binding that stands for an arbitrary memo group.
    Leaf(LeafOperator),
}

impl LogicalOp {
    pub fn op_type(&self) -> OperatorType {
        match self {
            LogicalOp::Get(_) => OperatorType::Get,
            LogicalOp::Filter(_) => OperatorType::Filter,
            LogicalOp::InnerJoin(_) => OperatorType::InnerJoin,
            LogicalOp::GroupBy(_) => OperatorType::GroupBy,
            LogicalOp::Aggregate(_) => OperatorType::Aggregate,
            LogicalOp::Distinct(_) => OperatorType::Distinct,
            LogicalOp::Limit(_) => OperatorType::Limit,
            LogicalOp::QueryDerivedGet(_) => OperatorType::QueryDerivedGet,
            LogicalOp::Insert(_) => OperatorType::Insert,
            LogicalOp::InsertSelect(_) => OperatorType::InsertSelect,
            LogicalOp::Update(_) => OperatorType::Update,
            LogicalOp::Delete(_) => OperatorType::Delete,
            LogicalOp::Leaf(_) => OperatorType::Leaf,
        }
    }

    /// The table aliases introduced by this operator itself (not by its inputs).
    pub fn own_aliases(&self) -> HashSet<String> {
        let mut aliases = HashSet::new();
        match self {
            LogicalOp::Get(get) => {
                aliases.insert(get.alias.clone());
            }
            LogicalOp::QueryDerivedGet(get) => {
                aliases.insert(get.alias.clone());
            }
            _ => {}
        }
        aliases
    }
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOp::Get(expr) => expr.fmt(f),
            LogicalOp::Filter(expr) => expr.fmt(f),
            LogicalOp::InnerJoin(expr) => expr.fmt(f),
            LogicalOp::GroupBy(expr) => expr.fmt(f),
            LogicalOp::Aggregate(expr) => expr.fmt(f),
            LogicalOp::Distinct(expr) => expr.fmt(f),
            LogicalOp::Limit(expr) => expr.fmt(f),
            LogicalOp::QueryDerivedGet(expr) => expr.fmt(f),
            LogicalOp::Insert(expr) => expr.fmt(f),
            LogicalOp::InsertSelect(expr) => expr.fmt(f),
            LogicalOp::Update(expr) => expr.fmt(f),
            LogicalOp::Delete(expr) => expr.fmt(f),
            LogicalOp::Leaf(expr) => expr.fmt(f),
        }
    }
}

/// Logical operator that returns data from a source table.
/// `table` is `None` when the query references no table at all (e.g. `SELECT 1`).
/// Predicates embedded by the rewrite phase are evaluated by the chosen scan.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalGet {
    pub table: Option<String>,
    pub alias: String,
    pub predicates: Vec<AnnotatedExpr>,
}

impl Display for LogicalGet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalGet {}", self.alias)?;
        if !self.predicates.is_empty() {
            write!(f, " preds={}", format_predicates(&self.predicates))?;
        }
        Ok(())
    }
}

/// Logical filter operator.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalFilter {
    pub predicates: Vec<AnnotatedExpr>,
}

impl Display for LogicalFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalFilter preds={}", format_predicates(&self.predicates))
    }
}

/// Logical inner join operator.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalInnerJoin {
    pub predicates: Vec<AnnotatedExpr>,
}

impl Display for LogicalInnerJoin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalInnerJoin preds={}", format_predicates(&self.predicates))
    }
}

/// Logical group-by operator.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalGroupBy {
    pub columns: Vec<ScalarExprRef>,
    pub having: Option<ScalarExprRef>,
}

impl Display for LogicalGroupBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalGroupBy cols=[{}]", self.columns.iter().join(", "))
    }
}

/// Logical aggregate operator without grouping columns.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalAggregate {
    pub aggr_exprs: Vec<ScalarExprRef>,
}

impl Display for LogicalAggregate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalAggregate aggrs=[{}]", self.aggr_exprs.iter().join(", "))
    }
}

/// Logical distinct operator.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalDistinct {
    pub columns: Vec<ScalarExprRef>,
}

impl Display for LogicalDistinct {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalDistinct cols=[{}]", self.columns.iter().join(", "))
    }
}

/// Logical limit operator.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalLimit {
    pub offset: usize,
    pub limit: usize,
}

impl Display for LogicalLimit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalLimit offset={} limit={}", self.offset, self.limit)
    }
}

/// Logical operator that returns data from a derived table.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalQueryDerivedGet {
    pub alias: String,
}

impl Display for LogicalQueryDerivedGet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalQueryDerivedGet {}", self.alias)
    }
}

/// Logical INSERT with literal rows.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalInsert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<ScalarExprRef>>,
}

impl Display for LogicalInsert {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalInsert {} rows={}", self.table, self.values.len())
    }
}

/// Logical INSERT that takes its rows from a query.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalInsertSelect {
    pub table: String,
}

impl Display for LogicalInsertSelect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalInsertSelect {}", self.table)
    }
}

/// Logical UPDATE.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalUpdate {
    pub table: String,
    pub updates: Vec<(String, ScalarExprRef)>,
}

impl Display for LogicalUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalUpdate {}", self.table)
    }
}

/// Logical DELETE.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LogicalDelete {
    pub table: String,
}

impl Display for LogicalDelete {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogicalDelete {}", self.table)
    }
}

/// Stands for an arbitrary memo group during pattern binding. A leaf remembers the group
/// it was bound to so that expressions produced by a rule can be inserted back into the memo
/// with their children resolved to existing groups.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LeafOperator {
    pub group: GroupId,
}

impl Display for LeafOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Leaf {}", self.group)
    }
}
