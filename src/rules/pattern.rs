//! Patterns and pattern binding.
//!
//! A pattern is a tree of operator-type slots. A concrete node matches a group expression
//! with the same operator type and arity; a [leaf](Pattern::Leaf) matches any child group
//! without descending into it. The [binding iterator](BindingIterator) enumerates every way
//! a pattern can be laid over the expressions stored in a memo.

use itertools::Itertools;

use crate::error::OptimizerError;
use crate::memo::{ExprId, GroupId, Memo};
use crate::operators::{OperatorExpr, OperatorType};

/// A pattern node.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches an expression with the given operator type and children matching the
    /// child patterns.
    Operator {
        op_type: OperatorType,
        children: Vec<Pattern>,
    },
    /// Matches any child group. The binding materializes a leaf operator carrying the
    /// group so that rule output can reference it.
    Leaf,
}

impl Pattern {
    /// Creates a pattern matching an operator with the given children.
    pub fn operator(op_type: OperatorType, children: Vec<Pattern>) -> Pattern {
        Pattern::Operator { op_type, children }
    }

    /// Creates a leaf pattern.
    pub fn leaf() -> Pattern {
        Pattern::Leaf
    }

    /// Child patterns of this node.
    pub fn children(&self) -> &[Pattern] {
        match self {
            Pattern::Operator { children, .. } => children,
            Pattern::Leaf => &[],
        }
    }

    /// The number of child patterns.
    pub fn child_count(&self) -> usize {
        self.children().len()
    }
}

/// Iterates over all bindings of a pattern against a group expression.
/// Bindings are enumerated depth-first and each binding is reported exactly once.
pub struct BindingIterator {
    bindings: std::vec::IntoIter<OperatorExpr>,
}

impl Iterator for BindingIterator {
    type Item = OperatorExpr;

    fn next(&mut self) -> Option<Self::Item> {
        self.bindings.next()
    }
}

/// Enumerates the bindings of `pattern` against the group expression `expr`.
pub fn bind_pattern(memo: &Memo, expr: ExprId, pattern: &Pattern) -> Result<BindingIterator, OptimizerError> {
    let bindings = expr_bindings(memo, expr, pattern)?;
    Ok(BindingIterator {
        bindings: bindings.into_iter(),
    })
}

fn expr_bindings(memo: &Memo, expr_id: ExprId, pattern: &Pattern) -> Result<Vec<OperatorExpr>, OptimizerError> {
    let expr = memo.expr(expr_id)?;
    let (op_type, child_patterns) = match pattern {
        Pattern::Leaf => return Ok(vec![OperatorExpr::leaf(expr.group_id())]),
        Pattern::Operator { op_type, children } => (op_type, children),
    };

    if expr.operator().op_type() != *op_type || expr.children().len() != child_patterns.len() {
        return Ok(Vec::new());
    }
    if child_patterns.is_empty() {
        return Ok(vec![OperatorExpr::from(expr.operator().clone())]);
    }

    let mut child_bindings = Vec::with_capacity(child_patterns.len());
    for (child_group, child_pattern) in expr.children().iter().zip(child_patterns.iter()) {
        let bindings = group_bindings(memo, *child_group, child_pattern)?;
        // Fail fast: no binding for one child means no binding for the whole pattern.
        if bindings.is_empty() {
            return Ok(Vec::new());
        }
        child_bindings.push(bindings);
    }

    let operator = expr.operator().clone();
    Ok(child_bindings
        .into_iter()
        .multi_cartesian_product()
        .map(|children| OperatorExpr::new(operator.clone(), children))
        .collect())
}

fn group_bindings(memo: &Memo, group: GroupId, pattern: &Pattern) -> Result<Vec<OperatorExpr>, OptimizerError> {
    match pattern {
        Pattern::Leaf => Ok(vec![OperatorExpr::leaf(memo.resolve(group)?)]),
        Pattern::Operator { .. } => {
            let exprs = memo.group(group)?.logical_expressions().to_vec();
            let mut bindings = Vec::new();
            for expr in exprs {
                bindings.extend(expr_bindings(memo, expr, pattern)?);
            }
            Ok(bindings)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::operators::logical::{LogicalGet, LogicalInnerJoin, LogicalOp};
    use crate::operators::Operator;

    fn get(alias: &str) -> OperatorExpr {
        OperatorExpr::from(LogicalOp::Get(LogicalGet {
            table: Some(alias.to_uppercase()),
            alias: alias.into(),
            predicates: vec![],
        }))
    }

    fn join(left: OperatorExpr, right: OperatorExpr) -> OperatorExpr {
        OperatorExpr::new(LogicalOp::InnerJoin(LogicalInnerJoin { predicates: vec![] }), vec![left, right])
    }

    fn join_pattern() -> Pattern {
        Pattern::operator(OperatorType::InnerJoin, vec![Pattern::leaf(), Pattern::leaf()])
    }

    #[test]
    fn test_bind_leaves() -> Result<(), OptimizerError> {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&join(get("a"), get("b")))?;

        let bindings: Vec<_> = bind_pattern(&memo, expr, &join_pattern())?.collect();
        assert_eq!(bindings.len(), 1);

        let binding = &bindings[0];
        assert!(matches!(binding.operator(), Operator::Logical(LogicalOp::InnerJoin(_))));
        assert!(matches!(binding.children()[0].operator(), Operator::Logical(LogicalOp::Leaf(_))));
        assert!(matches!(binding.children()[1].operator(), Operator::Logical(LogicalOp::Leaf(_))));

        Ok(())
    }

    #[test]
    fn test_type_mismatch_produces_no_bindings() -> Result<(), OptimizerError> {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&get("a"))?;

        let bindings: Vec<_> = bind_pattern(&memo, expr, &join_pattern())?.collect();
        assert!(bindings.is_empty());

        Ok(())
    }

    #[test]
    fn test_bind_nested_pattern() -> Result<(), OptimizerError> {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&join(join(get("a"), get("b")), get("c")))?;

        // InnerJoin(InnerJoin(Leaf, Leaf), Leaf)
        let pattern = Pattern::operator(OperatorType::InnerJoin, vec![join_pattern(), Pattern::leaf()]);

        let bindings: Vec<_> = bind_pattern(&memo, expr, &pattern)?.collect();
        assert_eq!(bindings.len(), 1);

        let inner = &bindings[0].children()[0];
        assert!(matches!(inner.operator(), Operator::Logical(LogicalOp::InnerJoin(_))));
        assert_eq!(inner.children().len(), 2);

        Ok(())
    }

    #[test]
    fn test_nested_pattern_does_not_match_flat_join() -> Result<(), OptimizerError> {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&join(get("a"), get("b")))?;

        let pattern = Pattern::operator(OperatorType::InnerJoin, vec![join_pattern(), Pattern::leaf()]);
        let bindings: Vec<_> = bind_pattern(&memo, expr, &pattern)?.collect();
        assert!(bindings.is_empty(), "left child group holds no join expression");

        Ok(())
    }

    #[test]
    fn test_multiple_bindings_per_child_group() -> Result<(), OptimizerError> {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&join(join(get("a"), get("b")), get("c")))?;

        // Add the commuted join to the inner group: the nested pattern now binds twice.
        let inner_expr = {
            let inner_group = memo.expr(expr)?.children()[0];
            memo.group(inner_group)?.logical_expressions()[0]
        };
        let inner_group = memo.expr(inner_expr)?.group_id();
        let children = memo.expr(inner_expr)?.children().to_vec();
        let commuted = OperatorExpr::new(
            LogicalOp::InnerJoin(LogicalInnerJoin { predicates: vec![] }),
            vec![OperatorExpr::leaf(children[1]), OperatorExpr::leaf(children[0])],
        );
        memo.insert_expression(&commuted, Some(inner_group), false)?;

        let pattern = Pattern::operator(OperatorType::InnerJoin, vec![join_pattern(), Pattern::leaf()]);
        let bindings: Vec<_> = bind_pattern(&memo, expr, &pattern)?.collect();
        assert_eq!(bindings.len(), 2);

        Ok(())
    }
}
