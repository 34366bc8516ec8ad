//! Operators and operator expressions.

use std::fmt::{Display, Formatter};

use crate::error::OptimizerError;
use crate::memo::GroupId;
use crate::operators::logical::{LeafOperator, LogicalOp};
use crate::operators::physical::PhysicalOp;

pub mod logical;
pub mod physical;
pub mod scalar;

/// An operator is either a [logical](LogicalOp) or a [physical](PhysicalOp) operator.
/// Equality and hashing are defined over the operator payload and never include child
/// relations, so that structurally identical expressions collapse in a memo.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Operator {
    Logical(LogicalOp),
    Physical(PhysicalOp),
}

impl Operator {
    /// Returns `true` if this is a logical operator.
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::Logical(_))
    }

    /// Returns `true` if this is a physical operator.
    pub fn is_physical(&self) -> bool {
        matches!(self, Operator::Physical(_))
    }

    /// The type tag of this operator, used by pattern matching.
    pub fn op_type(&self) -> OperatorType {
        match self {
            Operator::Logical(expr) => expr.op_type(),
            Operator::Physical(expr) => expr.op_type(),
        }
    }

    /// Returns a reference to the logical operator or an error.
    pub fn logical(&self) -> Result<&LogicalOp, OptimizerError> {
        match self {
            Operator::Logical(expr) => Ok(expr),
            Operator::Physical(expr) => {
                Err(OptimizerError::internal(format!("Expected a logical operator but got: {}", expr)))
            }
        }
    }

    /// Returns a reference to the physical operator or an error.
    pub fn physical(&self) -> Result<&PhysicalOp, OptimizerError> {
        match self {
            Operator::Physical(expr) => Ok(expr),
            Operator::Logical(expr) => {
                Err(OptimizerError::internal(format!("Expected a physical operator but got: {}", expr)))
            }
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Logical(expr) => expr.fmt(f),
            Operator::Physical(expr) => expr.fmt(f),
        }
    }
}

impl From<LogicalOp> for Operator {
    fn from(expr: LogicalOp) -> Self {
        Operator::Logical(expr)
    }
}

impl From<PhysicalOp> for Operator {
    fn from(expr: PhysicalOp) -> Self {
        Operator::Physical(expr)
    }
}

/// Type tags of operators. Patterns match expressions by comparing these tags.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OperatorType {
    // logical
    Leaf,
    Get,
    Filter,
    InnerJoin,
    GroupBy,
    Aggregate,
    Distinct,
    Limit,
    QueryDerivedGet,
    Insert,
    InsertSelect,
    Update,
    Delete,
    // physical
    DummyScan,
    SeqScan,
    IndexScan,
    NLJoin,
    HashJoin,
    HashGroupBy,
    PhysicalAggregate,
    PhysicalDistinct,
    PhysicalLimit,
    Sort,
    QueryDerivedScan,
    PhysicalInsert,
    PhysicalInsertSelect,
    PhysicalUpdate,
    PhysicalDelete,
}

/// An operator expression is an operator plus an ordered list of child operator expressions.
/// This is the shape rules match against and the shape their transformations produce.
/// Children bound from a memo are represented by [leaf](LogicalOp::Leaf) operators.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OperatorExpr {
    operator: Operator,
    children: Vec<OperatorExpr>,
}

impl OperatorExpr {
    /// Creates an expression with the given children.
    pub fn new<T>(operator: T, children: Vec<OperatorExpr>) -> Self
    where
        T: Into<Operator>,
    {
        OperatorExpr {
            operator: operator.into(),
            children,
        }
    }

    /// Creates a leaf expression standing for the given memo group.
    pub fn leaf(group: GroupId) -> Self {
        OperatorExpr::from(LogicalOp::Leaf(LeafOperator { group }))
    }

    /// A reference to the operator of this expression.
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Child expressions.
    pub fn children(&self) -> &[OperatorExpr] {
        &self.children
    }

    /// Returns the `i`-th child expression.
    pub fn child(&self, i: usize) -> Result<&OperatorExpr, OptimizerError> {
        self.children
            .get(i)
            .ok_or_else(|| OptimizerError::internal(format!("Expression {} has no child {}", self.operator, i)))
    }
}

impl From<Operator> for OperatorExpr {
    fn from(operator: Operator) -> Self {
        OperatorExpr {
            operator,
            children: Vec::new(),
        }
    }
}

impl From<LogicalOp> for OperatorExpr {
    fn from(operator: LogicalOp) -> Self {
        OperatorExpr::from(Operator::Logical(operator))
    }
}

impl From<PhysicalOp> for OperatorExpr {
    fn from(operator: PhysicalOp) -> Self {
        OperatorExpr::from(Operator::Physical(operator))
    }
}

impl Display for OperatorExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_operator_tree(self))
    }
}

/// Builds a textual representation of the given operator tree:
///
/// ```text
///  RootOperator
///    ChildOperator_0
///      ...
///    ChildOperator_n
/// ```
pub fn format_operator_tree(expr: &OperatorExpr) -> String {
    let mut buf = String::new();
    format_rec(expr, 0, &mut buf);
    buf
}

fn format_rec(expr: &OperatorExpr, depth: usize, buf: &mut String) {
    if depth > 0 {
        buf.push('\n');
    }
    for _ in 0..depth {
        buf.push_str("  ");
    }
    buf.push_str(&format!("{}", expr.operator));
    for child in expr.children() {
        format_rec(child, depth + 1, buf);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::operators::logical::{LogicalGet, LogicalInnerJoin};

    fn get(alias: &str) -> OperatorExpr {
        OperatorExpr::from(LogicalOp::Get(LogicalGet {
            table: Some(alias.to_string()),
            alias: alias.to_lowercase(),
            predicates: vec![],
        }))
    }

    #[test]
    fn test_operator_equality_excludes_children() {
        let join = LogicalOp::InnerJoin(LogicalInnerJoin { predicates: vec![] });

        let lhs = OperatorExpr::new(join.clone(), vec![get("A"), get("B")]);
        let rhs = OperatorExpr::new(join.clone(), vec![get("B"), get("A")]);

        assert_eq!(lhs.operator(), rhs.operator(), "operators are equal");
        assert_ne!(lhs, rhs, "expressions are not");
    }

    #[test]
    fn test_format_operator_tree() {
        let join = LogicalOp::InnerJoin(LogicalInnerJoin { predicates: vec![] });
        let expr = OperatorExpr::new(join, vec![get("A"), get("B")]);

        let expected = r#"
LogicalInnerJoin preds=[]
  LogicalGet a
  LogicalGet b
"#;
        assert_eq!(format_operator_tree(&expr), expected.trim());
    }
}
