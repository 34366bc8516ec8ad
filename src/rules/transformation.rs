//! Transformation rules. See [rules module](super).

use std::collections::HashSet;

use crate::error::OptimizerError;
use crate::operators::logical::{LogicalInnerJoin, LogicalOp};
use crate::operators::{Operator, OperatorExpr, OperatorType};
use crate::rules::pattern::Pattern;
use crate::rules::{leaf_group, Rule, RuleContext, RuleType};

/// Swaps the inputs of an inner join: `A ⋈ B` becomes `B ⋈ A`.
/// Applying the rule twice reaches the original expression, which the memo collapses.
pub struct InnerJoinCommutativityRule {
    pattern: Pattern,
}

impl InnerJoinCommutativityRule {
    pub fn new() -> Self {
        InnerJoinCommutativityRule {
            pattern: Pattern::operator(OperatorType::InnerJoin, vec![Pattern::leaf(), Pattern::leaf()]),
        }
    }
}

impl Rule for InnerJoinCommutativityRule {
    fn name(&self) -> String {
        "InnerJoinCommutativity".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let join = match expr.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            _ => return Ok(Vec::new()),
        };
        let left = expr.child(0)?;
        let right = expr.child(1)?;

        let commuted = OperatorExpr::new(
            LogicalOp::InnerJoin(join.clone()),
            vec![right.clone(), left.clone()],
        );
        Ok(vec![commuted])
    }
}

/// Rotates a left-deep join to the right: `(A ⋈ B) ⋈ C` becomes `A ⋈ (B ⋈ C)`.
///
/// The predicates of both joins are pooled and redistributed: a predicate moves to the
/// join whose descendant alias set is the minimal superset of the aliases it references,
/// so a predicate over `B` and `C` lands on the new inner join while a predicate touching
/// `A` stays on the outer join.
pub struct InnerJoinAssociativityRule {
    pattern: Pattern,
}

impl InnerJoinAssociativityRule {
    pub fn new() -> Self {
        let inner = Pattern::operator(OperatorType::InnerJoin, vec![Pattern::leaf(), Pattern::leaf()]);
        InnerJoinAssociativityRule {
            pattern: Pattern::operator(OperatorType::InnerJoin, vec![inner, Pattern::leaf()]),
        }
    }
}

impl Rule for InnerJoinAssociativityRule {
    fn name(&self) -> String {
        "InnerJoinAssociativity".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let outer = match expr.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            _ => return Ok(Vec::new()),
        };
        let inner_expr = expr.child(0)?;
        let inner = match inner_expr.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            _ => return Ok(Vec::new()),
        };

        let a = inner_expr.child(0)?;
        let b = inner_expr.child(1)?;
        let c = expr.child(1)?;

        let memo = ctx.memo();
        let mut bc_aliases: HashSet<String> = memo.group(leaf_group(b)?)?.table_aliases().clone();
        bc_aliases.extend(memo.group(leaf_group(c)?)?.table_aliases().iter().cloned());

        let mut outer_predicates = Vec::new();
        let mut inner_predicates = Vec::new();
        for predicate in outer.predicates.iter().chain(inner.predicates.iter()) {
            if predicate.aliases.is_subset(&bc_aliases) {
                inner_predicates.push(predicate.clone());
            } else {
                outer_predicates.push(predicate.clone());
            }
        }

        let new_inner = OperatorExpr::new(
            LogicalOp::InnerJoin(LogicalInnerJoin {
                predicates: inner_predicates,
            }),
            vec![b.clone(), c.clone()],
        );
        let new_outer = OperatorExpr::new(
            LogicalOp::InnerJoin(LogicalInnerJoin {
                predicates: outer_predicates,
            }),
            vec![a.clone(), new_inner],
        );
        Ok(vec![new_outer])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memo::Memo;
    use crate::operators::logical::LogicalGet;
    use crate::operators::scalar::{AnnotatedExpr, BinaryOp, ScalarExpr};
    use crate::properties::PropertySet;
    use crate::rules::pattern::bind_pattern;
    use std::rc::Rc;

    fn get(alias: &str) -> OperatorExpr {
        OperatorExpr::from(LogicalOp::Get(LogicalGet {
            table: Some(alias.to_uppercase()),
            alias: alias.into(),
            predicates: vec![],
        }))
    }

    fn join(left: OperatorExpr, right: OperatorExpr, predicates: Vec<AnnotatedExpr>) -> OperatorExpr {
        OperatorExpr::new(LogicalOp::InnerJoin(LogicalInnerJoin { predicates }), vec![left, right])
    }

    fn eq_pred(left: (&str, &str), right: (&str, &str)) -> AnnotatedExpr {
        AnnotatedExpr::new(ScalarExpr::binary(
            ScalarExpr::column(left.0, left.1),
            BinaryOp::Eq,
            ScalarExpr::column(right.0, right.1),
        ))
    }

    fn apply_rule<R>(rule: &R, memo: &Memo, binding: &OperatorExpr) -> Vec<OperatorExpr>
    where
        R: Rule,
    {
        let ctx = RuleContext::new(Rc::new(PropertySet::new()), memo);
        assert!(rule.check(binding, &ctx), "rule must apply: {}", rule.name());
        rule.apply(binding, &ctx).expect("failed to apply a rule")
    }

    #[test]
    fn test_join_commutativity() {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&join(get("a"), get("b"), vec![])).unwrap();

        let rule = InnerJoinCommutativityRule::new();
        let bindings: Vec<_> = bind_pattern(&memo, expr, rule.pattern()).unwrap().collect();
        assert_eq!(bindings.len(), 1);

        let outputs = apply_rule(&rule, &memo, &bindings[0]);
        assert_eq!(outputs.len(), 1);

        let commuted = &outputs[0];
        let binding = &bindings[0];
        assert_eq!(commuted.children()[0], binding.children()[1]);
        assert_eq!(commuted.children()[1], binding.children()[0]);
    }

    #[test]
    fn test_join_commutativity_is_self_inverse() {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&join(get("a"), get("b"), vec![])).unwrap();
        let group = memo.expr(expr).unwrap().group_id();

        let rule = InnerJoinCommutativityRule::new();

        let bindings: Vec<_> = bind_pattern(&memo, expr, rule.pattern()).unwrap().collect();
        let commuted = apply_rule(&rule, &memo, &bindings[0]).remove(0);
        let (commuted_id, new) = memo.insert_expression(&commuted, Some(group), false).unwrap();
        assert!(new, "the commuted join is a new expression");

        let bindings: Vec<_> = bind_pattern(&memo, commuted_id, rule.pattern()).unwrap().collect();
        let back = apply_rule(&rule, &memo, &bindings[0]).remove(0);
        let (back_id, new) = memo.insert_expression(&back, Some(group), false).unwrap();

        assert!(!new, "applying the rule twice returns to the original expression");
        assert_eq!(back_id, expr);
    }

    /// `(test1 ⋈ test2) ⋈ test3` with `test1.a = test2.a` on the inner join and
    /// `test1.a = test3.a` on the outer: after rotation both predicates reference
    /// `test1`, so the outer join carries both and the new inner join carries none.
    #[test]
    fn test_join_associativity_moves_predicates_to_outer() {
        let mut memo = Memo::new();

        let inner = join(get("test1"), get("test2"), vec![eq_pred(("test1", "a"), ("test2", "a"))]);
        let outer = join(inner, get("test3"), vec![eq_pred(("test1", "a"), ("test3", "a"))]);
        let (expr, _) = memo.insert(&outer).unwrap();

        let rule = InnerJoinAssociativityRule::new();
        let bindings: Vec<_> = bind_pattern(&memo, expr, rule.pattern()).unwrap().collect();
        assert_eq!(bindings.len(), 1);

        let outputs = apply_rule(&rule, &memo, &bindings[0]);
        assert_eq!(outputs.len(), 1);
        let rotated = &outputs[0];

        let outer_join = match rotated.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            other => panic!("Unexpected operator: {}", other),
        };
        let inner_join = match rotated.children()[1].operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            other => panic!("Unexpected operator: {}", other),
        };

        assert_eq!(outer_join.predicates.len(), 2);
        assert_eq!(inner_join.predicates.len(), 0);
    }

    /// Same shape with `test1.a = test3.a` and `test2.a = test3.a` both on the outer
    /// join: `test2.a = test3.a` references only the aliases of the new inner join and
    /// moves down, the other predicate stays.
    #[test]
    fn test_join_associativity_redistributes_by_minimal_alias_set() {
        let mut memo = Memo::new();

        let inner = join(get("test1"), get("test2"), vec![]);
        let outer = join(
            inner,
            get("test3"),
            vec![eq_pred(("test1", "a"), ("test3", "a")), eq_pred(("test2", "a"), ("test3", "a"))],
        );
        let (expr, _) = memo.insert(&outer).unwrap();

        let rule = InnerJoinAssociativityRule::new();
        let bindings: Vec<_> = bind_pattern(&memo, expr, rule.pattern()).unwrap().collect();
        let outputs = apply_rule(&rule, &memo, &bindings[0]);
        let rotated = &outputs[0];

        let outer_join = match rotated.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            other => panic!("Unexpected operator: {}", other),
        };
        let inner_join = match rotated.children()[1].operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            other => panic!("Unexpected operator: {}", other),
        };

        assert_eq!(outer_join.predicates.len(), 1);
        assert_eq!(outer_join.predicates[0], eq_pred(("test1", "a"), ("test3", "a")));
        assert_eq!(inner_join.predicates.len(), 1);
        assert_eq!(inner_join.predicates[0], eq_pred(("test2", "a"), ("test3", "a")));
    }
}
