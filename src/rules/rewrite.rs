//! Rewrite rules, applied exhaustively before the cost-based search.
//!
//! Each rule produces a strictly better shape: filters merge, migrate below joins and
//! finally dissolve into the scans that evaluate them.

use crate::error::OptimizerError;
use crate::operators::logical::{LogicalFilter, LogicalGet, LogicalInnerJoin, LogicalOp};
use crate::operators::{Operator, OperatorExpr, OperatorType};
use crate::rules::pattern::Pattern;
use crate::rules::{leaf_group, Rule, RuleContext, RuleType};

/// Splits the predicates of a filter sitting on top of an inner join: predicates over one
/// side only become filters below the join, predicates spanning both sides become join
/// predicates. The filter operator itself disappears.
pub struct PushFilterThroughJoinRule {
    pattern: Pattern,
}

impl PushFilterThroughJoinRule {
    pub fn new() -> Self {
        let join = Pattern::operator(OperatorType::InnerJoin, vec![Pattern::leaf(), Pattern::leaf()]);
        PushFilterThroughJoinRule {
            pattern: Pattern::operator(OperatorType::Filter, vec![join]),
        }
    }
}

impl Rule for PushFilterThroughJoinRule {
    fn name(&self) -> String {
        "PushFilterThroughJoin".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Rewrite
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let filter = match expr.operator() {
            Operator::Logical(LogicalOp::Filter(filter)) => filter,
            _ => return Ok(Vec::new()),
        };
        let join_expr = expr.child(0)?;
        let join = match join_expr.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            _ => return Ok(Vec::new()),
        };
        let left = join_expr.child(0)?;
        let right = join_expr.child(1)?;

        let memo = ctx.memo();
        let left_aliases = memo.group(leaf_group(left)?)?.table_aliases().clone();
        let right_aliases = memo.group(leaf_group(right)?)?.table_aliases().clone();

        let mut left_predicates = Vec::new();
        let mut right_predicates = Vec::new();
        let mut join_predicates = Vec::new();
        for predicate in filter.predicates.iter() {
            if predicate.aliases.is_subset(&left_aliases) {
                left_predicates.push(predicate.clone());
            } else if predicate.aliases.is_subset(&right_aliases) {
                right_predicates.push(predicate.clone());
            } else {
                join_predicates.push(predicate.clone());
            }
        }

        // Spanning predicates extend the join's own predicate set.
        join_predicates.extend(join.predicates.iter().cloned());

        let left_input = if left_predicates.is_empty() {
            left.clone()
        } else {
            OperatorExpr::new(
                LogicalOp::Filter(LogicalFilter {
                    predicates: left_predicates,
                }),
                vec![left.clone()],
            )
        };
        let right_input = if right_predicates.is_empty() {
            right.clone()
        } else {
            OperatorExpr::new(
                LogicalOp::Filter(LogicalFilter {
                    predicates: right_predicates,
                }),
                vec![right.clone()],
            )
        };

        let output = OperatorExpr::new(
            LogicalOp::InnerJoin(LogicalInnerJoin {
                predicates: join_predicates,
            }),
            vec![left_input, right_input],
        );
        Ok(vec![output])
    }
}

/// Merges two adjacent filters into one carrying the union of their predicates.
pub struct CombineConsecutiveFilterRule {
    pattern: Pattern,
}

impl CombineConsecutiveFilterRule {
    pub fn new() -> Self {
        let child = Pattern::operator(OperatorType::Filter, vec![Pattern::leaf()]);
        CombineConsecutiveFilterRule {
            pattern: Pattern::operator(OperatorType::Filter, vec![child]),
        }
    }
}

impl Rule for CombineConsecutiveFilterRule {
    fn name(&self) -> String {
        "CombineConsecutiveFilter".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Rewrite
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let parent = match expr.operator() {
            Operator::Logical(LogicalOp::Filter(filter)) => filter,
            _ => return Ok(Vec::new()),
        };
        let child_expr = expr.child(0)?;
        let child = match child_expr.operator() {
            Operator::Logical(LogicalOp::Filter(filter)) => filter,
            _ => return Ok(Vec::new()),
        };

        let mut predicates = parent.predicates.clone();
        predicates.extend(child.predicates.iter().cloned());

        let output = OperatorExpr::new(
            LogicalOp::Filter(LogicalFilter { predicates }),
            vec![child_expr.child(0)?.clone()],
        );
        Ok(vec![output])
    }
}

/// Folds a filter into its child `Get`: the scan chosen later evaluates the predicates.
pub struct EmbedFilterIntoGetRule {
    pattern: Pattern,
}

impl EmbedFilterIntoGetRule {
    pub fn new() -> Self {
        let get = Pattern::operator(OperatorType::Get, vec![]);
        EmbedFilterIntoGetRule {
            pattern: Pattern::operator(OperatorType::Filter, vec![get]),
        }
    }
}

impl Rule for EmbedFilterIntoGetRule {
    fn name(&self) -> String {
        "EmbedFilterIntoGet".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Rewrite
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let filter = match expr.operator() {
            Operator::Logical(LogicalOp::Filter(filter)) => filter,
            _ => return Ok(Vec::new()),
        };
        let get = match expr.child(0)?.operator() {
            Operator::Logical(LogicalOp::Get(get)) => get,
            _ => return Ok(Vec::new()),
        };

        let mut predicates = get.predicates.clone();
        predicates.extend(filter.predicates.iter().cloned());

        let output = OperatorExpr::from(LogicalOp::Get(LogicalGet {
            table: get.table.clone(),
            alias: get.alias.clone(),
            predicates,
        }));
        Ok(vec![output])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memo::Memo;
    use crate::operators::scalar::{AnnotatedExpr, BinaryOp, ScalarExpr, ScalarValue};
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

    fn filter(predicates: Vec<AnnotatedExpr>, input: OperatorExpr) -> OperatorExpr {
        OperatorExpr::new(LogicalOp::Filter(LogicalFilter { predicates }), vec![input])
    }

    fn column_pred(alias: &str, name: &str, value: i32) -> AnnotatedExpr {
        AnnotatedExpr::new(ScalarExpr::binary(
            ScalarExpr::column(alias, name),
            BinaryOp::Gt,
            ScalarExpr::value(ScalarValue::Int32(value)),
        ))
    }

    fn join_pred(left: (&str, &str), right: (&str, &str)) -> AnnotatedExpr {
        AnnotatedExpr::new(ScalarExpr::binary(
            ScalarExpr::column(left.0, left.1),
            BinaryOp::Eq,
            ScalarExpr::column(right.0, right.1),
        ))
    }

    fn apply_first<R>(rule: &R, memo: &Memo, expr: crate::memo::ExprId) -> Vec<OperatorExpr>
    where
        R: Rule,
    {
        let bindings: Vec<_> = bind_pattern(memo, expr, rule.pattern()).unwrap().collect();
        assert_eq!(bindings.len(), 1, "{} must bind exactly once", rule.name());
        let ctx = RuleContext::new(Rc::new(PropertySet::new()), memo);
        assert!(rule.check(&bindings[0], &ctx));
        rule.apply(&bindings[0], &ctx).unwrap()
    }

    #[test]
    fn test_push_filter_through_join() {
        let mut memo = Memo::new();
        let join = OperatorExpr::new(
            LogicalOp::InnerJoin(LogicalInnerJoin { predicates: vec![] }),
            vec![get("a"), get("b")],
        );
        let predicates = vec![
            column_pred("a", "a1", 1),
            column_pred("b", "b1", 2),
            join_pred(("a", "a2"), ("b", "b2")),
        ];
        let (expr, _) = memo.insert(&filter(predicates, join)).unwrap();

        let outputs = apply_first(&PushFilterThroughJoinRule::new(), &memo, expr);
        assert_eq!(outputs.len(), 1);
        let output = &outputs[0];

        let join = match output.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            other => panic!("Unexpected operator: {}", other),
        };
        assert_eq!(join.predicates, vec![join_pred(("a", "a2"), ("b", "b2"))], "spanning predicate joins the join");

        for (i, alias, name) in [(0usize, "a", "a1"), (1usize, "b", "b1")] {
            match output.children()[i].operator() {
                Operator::Logical(LogicalOp::Filter(filter)) => {
                    assert_eq!(filter.predicates.len(), 1);
                    assert_eq!(filter.predicates[0], column_pred(alias, name, if i == 0 { 1 } else { 2 }));
                }
                other => panic!("Unexpected child operator: {}", other),
            }
        }
    }

    #[test]
    fn test_push_filter_with_only_spanning_predicates_removes_the_filter() {
        let mut memo = Memo::new();
        let join = OperatorExpr::new(
            LogicalOp::InnerJoin(LogicalInnerJoin { predicates: vec![] }),
            vec![get("a"), get("b")],
        );
        let (expr, _) = memo.insert(&filter(vec![join_pred(("a", "a1"), ("b", "b1"))], join)).unwrap();

        let outputs = apply_first(&PushFilterThroughJoinRule::new(), &memo, expr);
        let output = &outputs[0];

        assert!(matches!(output.operator(), Operator::Logical(LogicalOp::InnerJoin(_))));
        assert!(matches!(output.children()[0].operator(), Operator::Logical(LogicalOp::Leaf(_))));
        assert!(matches!(output.children()[1].operator(), Operator::Logical(LogicalOp::Leaf(_))));
    }

    #[test]
    fn test_combine_consecutive_filters() {
        let mut memo = Memo::new();
        let inner = filter(vec![column_pred("a", "a2", 2)], get("a"));
        let outer = filter(vec![column_pred("a", "a1", 1)], inner);
        let (expr, _) = memo.insert(&outer).unwrap();

        let outputs = apply_first(&CombineConsecutiveFilterRule::new(), &memo, expr);
        let output = &outputs[0];

        match output.operator() {
            Operator::Logical(LogicalOp::Filter(filter)) => {
                assert_eq!(filter.predicates, vec![column_pred("a", "a1", 1), column_pred("a", "a2", 2)]);
            }
            other => panic!("Unexpected operator: {}", other),
        }
        assert!(matches!(output.children()[0].operator(), Operator::Logical(LogicalOp::Leaf(_))));
    }

    #[test]
    fn test_embed_filter_into_get() {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&filter(vec![column_pred("a", "a1", 5)], get("a"))).unwrap();

        let outputs = apply_first(&EmbedFilterIntoGetRule::new(), &memo, expr);
        let output = &outputs[0];

        match output.operator() {
            Operator::Logical(LogicalOp::Get(get)) => {
                assert_eq!(get.predicates, vec![column_pred("a", "a1", 5)]);
            }
            other => panic!("Unexpected operator: {}", other),
        }
        assert!(output.children().is_empty());
    }
}
