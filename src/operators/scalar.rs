//! Scalar expressions. The optimizer does not evaluate them, it only inspects their shape.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use itertools::Itertools;

/// A reference to a shared scalar expression. Expressions are immutable and may be shared
/// by multiple operators in a memo.
pub type ScalarExprRef = triomphe::Arc<ScalarExpr>;

/// A scalar expression used by operator payloads: filter predicates, join predicates,
/// grouping columns, projection lists.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ScalarExpr {
    /// A reference to a column of a table bound to `alias`.
    Column { alias: String, name: String },
    /// A constant value.
    Scalar(ScalarValue),
    /// A placeholder for a value provided at execution time.
    Parameter(usize),
    /// A binary expression.
    Binary {
        lhs: ScalarExprRef,
        op: BinaryOp,
        rhs: ScalarExprRef,
    },
}

impl ScalarExpr {
    /// Creates a column reference expression.
    pub fn column(alias: &str, name: &str) -> ScalarExprRef {
        ScalarExprRef::new(ScalarExpr::Column {
            alias: alias.into(),
            name: name.into(),
        })
    }

    /// Creates a constant expression.
    pub fn value(value: ScalarValue) -> ScalarExprRef {
        ScalarExprRef::new(ScalarExpr::Scalar(value))
    }

    /// Creates a binary expression.
    pub fn binary(lhs: ScalarExprRef, op: BinaryOp, rhs: ScalarExprRef) -> ScalarExprRef {
        ScalarExprRef::new(ScalarExpr::Binary { lhs, op, rhs })
    }

    /// Returns the column identity if this expression is a column reference.
    pub fn as_column(&self) -> Option<(&str, &str)> {
        match self {
            ScalarExpr::Column { alias, name } => Some((alias.as_str(), name.as_str())),
            _ => None,
        }
    }

    /// Returns `true` if this expression is a constant or a parameter.
    pub fn is_constant(&self) -> bool {
        matches!(self, ScalarExpr::Scalar(_) | ScalarExpr::Parameter(_))
    }

    /// Collects the table aliases referenced by this expression into `out`.
    pub fn collect_aliases(&self, out: &mut HashSet<String>) {
        match self {
            ScalarExpr::Column { alias, .. } => {
                out.insert(alias.clone());
            }
            ScalarExpr::Scalar(_) | ScalarExpr::Parameter(_) => {}
            ScalarExpr::Binary { lhs, rhs, .. } => {
                lhs.collect_aliases(out);
                rhs.collect_aliases(out);
            }
        }
    }

    /// Returns the set of table aliases referenced by this expression.
    pub fn referenced_aliases(&self) -> HashSet<String> {
        let mut aliases = HashSet::new();
        self.collect_aliases(&mut aliases);
        aliases
    }
}

impl Display for ScalarExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarExpr::Column { alias, name } => write!(f, "{}.{}", alias, name),
            ScalarExpr::Scalar(value) => write!(f, "{}", value),
            ScalarExpr::Parameter(index) => write!(f, "${}", index),
            ScalarExpr::Binary { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
        }
    }
}

/// A constant value.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int32(i32),
    String(String),
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "null"),
            ScalarValue::Bool(value) => write!(f, "{}", value),
            ScalarValue::Int32(value) => write!(f, "{}", value),
            ScalarValue::String(value) => write!(f, "'{}'", value),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// Returns `true` if this operator compares two values.
    pub fn is_comparison(&self) -> bool {
        !matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Returns the comparison with its operands swapped, e.g. `a < b` becomes `b > a`.
    pub fn reverse(&self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::LtEq => BinaryOp::GtEq,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::GtEq => BinaryOp::LtEq,
            _ => *self,
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        write!(f, "{}", op)
    }
}

/// A predicate expression annotated with the set of table aliases it references.
/// Pushdown and join rules dispatch predicates by comparing these sets with the
/// alias sets of memo groups.
#[derive(Debug, Clone)]
pub struct AnnotatedExpr {
    pub expr: ScalarExprRef,
    pub aliases: HashSet<String>,
}

impl AnnotatedExpr {
    /// Creates an annotated expression. The alias set is computed from the expression.
    pub fn new(expr: ScalarExprRef) -> Self {
        let aliases = expr.referenced_aliases();
        AnnotatedExpr { expr, aliases }
    }
}

// The alias set is derived from the expression, equality and hashing use the expression alone.
impl PartialEq for AnnotatedExpr {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Eq for AnnotatedExpr {}

impl Hash for AnnotatedExpr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.expr.hash(state);
    }
}

impl Display for AnnotatedExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl From<ScalarExprRef> for AnnotatedExpr {
    fn from(expr: ScalarExprRef) -> Self {
        AnnotatedExpr::new(expr)
    }
}

/// Splits a comparison into a column reference and a constant side.
/// Returns `(alias, column, operator, value)` where the operator is normalized as if
/// the column were on the left-hand side. Returns `None` for any other expression shape.
pub fn column_value_comparison(expr: &ScalarExpr) -> Option<(&str, &str, BinaryOp, &ScalarExprRef)> {
    match expr {
        ScalarExpr::Binary { lhs, op, rhs } if op.is_comparison() => match (lhs.as_column(), rhs.as_column()) {
            (Some((alias, name)), None) if rhs.is_constant() => Some((alias, name, *op, rhs)),
            (None, Some((alias, name))) if lhs.is_constant() => Some((alias, name, op.reverse(), lhs)),
            _ => None,
        },
        _ => None,
    }
}

/// Splits an equality into a pair of column references.
/// Returns `None` if the expression is not an equality between two columns.
pub fn column_pair_equality(expr: &ScalarExpr) -> Option<((&str, &str), (&str, &str))> {
    match expr {
        ScalarExpr::Binary {
            lhs,
            op: BinaryOp::Eq,
            rhs,
        } => match (lhs.as_column(), rhs.as_column()) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => None,
        },
        _ => None,
    }
}

/// Returns `true` if the given predicate is an equality with one side referencing only
/// aliases from `left` and the other side referencing only aliases from `right`.
/// Such predicates can be evaluated by building a hash table over one join input.
pub fn is_hashable_join_predicate(
    left: &HashSet<String>,
    right: &HashSet<String>,
    predicate: &AnnotatedExpr,
) -> bool {
    if let ScalarExpr::Binary {
        lhs,
        op: BinaryOp::Eq,
        rhs,
    } = &*predicate.expr
    {
        let lhs_aliases = lhs.referenced_aliases();
        let rhs_aliases = rhs.referenced_aliases();
        if lhs_aliases.is_empty() || rhs_aliases.is_empty() {
            return false;
        }
        (lhs_aliases.is_subset(left) && rhs_aliases.is_subset(right))
            || (lhs_aliases.is_subset(right) && rhs_aliases.is_subset(left))
    } else {
        false
    }
}

/// Formats a predicate list as `[p1, p2, ...]`.
pub fn format_predicates(predicates: &[AnnotatedExpr]) -> String {
    format!("[{}]", predicates.iter().join(", "))
}
