//! Physical operators supported by the optimizer.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::operators::scalar::{format_predicates, AnnotatedExpr, BinaryOp, ScalarExprRef};
use crate::operators::OperatorType;
use crate::properties::SortSpec;

/// A physical operator names the algorithm that computes the result of a logical operation.
/// Physical expressions are the subject of costing and property derivation.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PhysicalOp {
    /// Scan that produces no rows. Implements a `Get` without a table.
    DummyScan(PhysicalDummyScan),
    /// Full scan of a table.
    SeqScan(PhysicalSeqScan),
    /// Scan over an index of a table.
    IndexScan(PhysicalIndexScan),
    /// Nested-loop join.
    NLJoin(PhysicalNLJoin),
    /// Hash join.
    HashJoin(PhysicalHashJoin),
    /// Hash-based grouping.
    HashGroupBy(PhysicalHashGroupBy),
    /// Plain aggregation without grouping.
    Aggregate(PhysicalAggregate),
    /// Duplicate elimination.
    Distinct(PhysicalDistinct),
    /// Limit/offset.
    Limit(PhysicalLimit),
    /// Sort enforcer.
    Sort(PhysicalSort),
    /// Scan of a derived table.
    QueryDerivedScan(PhysicalQueryDerivedScan),
    /// INSERT with literal rows.
    Insert(PhysicalInsert),
    /// INSERT from a query.
    InsertSelect(PhysicalInsertSelect),
    /// UPDATE.
    Update(PhysicalUpdate),
    /// DELETE.
    Delete(PhysicalDelete),
}

impl PhysicalOp {
    pub fn op_type(&self) -> OperatorType {
        match self {
            PhysicalOp::DummyScan(_) => OperatorType::DummyScan,
            PhysicalOp::SeqScan(_) => OperatorType::SeqScan,
            PhysicalOp::IndexScan(_) => OperatorType::IndexScan,
            PhysicalOp::NLJoin(_) => OperatorType::NLJoin,
            PhysicalOp::HashJoin(_) => OperatorType::HashJoin,
            PhysicalOp::HashGroupBy(_) => OperatorType::HashGroupBy,
            PhysicalOp::Aggregate(_) => OperatorType::PhysicalAggregate,
            PhysicalOp::Distinct(_) => OperatorType::PhysicalDistinct,
            PhysicalOp::Limit(_) => OperatorType::PhysicalLimit,
            PhysicalOp::Sort(_) => OperatorType::Sort,
            PhysicalOp::QueryDerivedScan(_) => OperatorType::QueryDerivedScan,
            PhysicalOp::Insert(_) => OperatorType::PhysicalInsert,
            PhysicalOp::InsertSelect(_) => OperatorType::PhysicalInsertSelect,
            PhysicalOp::Update(_) => OperatorType::PhysicalUpdate,
            PhysicalOp::Delete(_) => OperatorType::PhysicalDelete,
        }
    }
}

impl Display for PhysicalOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PhysicalOp::DummyScan(expr) => expr.fmt(f),
            PhysicalOp::SeqScan(expr) => expr.fmt(f),
            PhysicalOp::IndexScan(expr) => expr.fmt(f),
            PhysicalOp::NLJoin(expr) => expr.fmt(f),
            PhysicalOp::HashJoin(expr) => expr.fmt(f),
            PhysicalOp::HashGroupBy(expr) => expr.fmt(f),
            PhysicalOp::Aggregate(expr) => expr.fmt(f),
            PhysicalOp::Distinct(expr) => expr.fmt(f),
            PhysicalOp::Limit(expr) => expr.fmt(f),
            PhysicalOp::Sort(expr) => expr.fmt(f),
            PhysicalOp::QueryDerivedScan(expr) => expr.fmt(f),
            PhysicalOp::Insert(expr) => expr.fmt(f),
            PhysicalOp::InsertSelect(expr) => expr.fmt(f),
            PhysicalOp::Update(expr) => expr.fmt(f),
            PhysicalOp::Delete(expr) => expr.fmt(f),
        }
    }
}

/// Scan that produces no rows.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalDummyScan {}

impl Display for PhysicalDummyScan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DummyScan")
    }
}

/// Full scan of a table. Predicates are evaluated against every row.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalSeqScan {
    pub table: String,
    pub alias: String,
    pub predicates: Vec<AnnotatedExpr>,
}

impl Display for PhysicalSeqScan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SeqScan {}", self.alias)?;
        if !self.predicates.is_empty() {
            write!(f, " preds={}", format_predicates(&self.predicates))?;
        }
        Ok(())
    }
}

/// Scan over an index. `key_columns`/`key_operators`/`key_values` describe the probe keys
/// extracted from the scan predicates; all three have the same length. `ordering` is the
/// ordering the index traversal produces.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalIndexScan {
    pub table: String,
    pub alias: String,
    pub index: String,
    pub predicates: Vec<AnnotatedExpr>,
    pub key_columns: Vec<String>,
    pub key_operators: Vec<BinaryOp>,
    pub key_values: Vec<ScalarExprRef>,
    pub ordering: Option<SortSpec>,
}

impl Display for PhysicalIndexScan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "IndexScan {} index={}", self.alias, self.index)?;
        if !self.key_columns.is_empty() {
            write!(f, " keys=[{}]", self.key_columns.iter().join(", "))?;
        }
        Ok(())
    }
}

/// Nested-loop join.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalNLJoin {
    pub predicates: Vec<AnnotatedExpr>,
}

impl Display for PhysicalNLJoin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NLJoin preds={}", format_predicates(&self.predicates))
    }
}

/// Hash join.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalHashJoin {
    pub predicates: Vec<AnnotatedExpr>,
}

impl Display for PhysicalHashJoin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashJoin preds={}", format_predicates(&self.predicates))
    }
}

/// Hash-based grouping.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalHashGroupBy {
    pub columns: Vec<ScalarExprRef>,
    pub having: Option<ScalarExprRef>,
}

impl Display for PhysicalHashGroupBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashGroupBy cols=[{}]", self.columns.iter().join(", "))
    }
}

/// Plain aggregation without grouping.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalAggregate {
    pub aggr_exprs: Vec<ScalarExprRef>,
}

impl Display for PhysicalAggregate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Aggregate aggrs=[{}]", self.aggr_exprs.iter().join(", "))
    }
}

/// Duplicate elimination.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalDistinct {
    pub columns: Vec<ScalarExprRef>,
}

impl Display for PhysicalDistinct {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Distinct cols=[{}]", self.columns.iter().join(", "))
    }
}

/// Limit/offset.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalLimit {
    pub offset: usize,
    pub limit: usize,
}

impl Display for PhysicalLimit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Limit offset={} limit={}", self.offset, self.limit)
    }
}

/// Sort enforcer. Inserted by the optimizer when a required ordering is not produced
/// by the input naturally.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalSort {
    pub sort: SortSpec,
}

impl Display for PhysicalSort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sort {}", self.sort)
    }
}

/// Scan of a derived table.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalQueryDerivedScan {
    pub alias: String,
}

impl Display for PhysicalQueryDerivedScan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryDerivedScan {}", self.alias)
    }
}

/// INSERT with literal rows.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalInsert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<ScalarExprRef>>,
}

impl Display for PhysicalInsert {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Insert {} rows={}", self.table, self.values.len())
    }
}

/// INSERT from a query.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalInsertSelect {
    pub table: String,
}

impl Display for PhysicalInsertSelect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "InsertSelect {}", self.table)
    }
}

/// UPDATE.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalUpdate {
    pub table: String,
    pub updates: Vec<(String, ScalarExprRef)>,
}

impl Display for PhysicalUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Update {}", self.table)
    }
}

/// DELETE.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalDelete {
    pub table: String,
}

impl Display for PhysicalDelete {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Delete {}", self.table)
    }
}
