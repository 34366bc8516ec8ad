//! Optimization rules.

use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use crate::catalog::CatalogRef;
use crate::error::OptimizerError;
use crate::memo::{GroupExpression, GroupId, Memo};
use crate::operators::logical::LogicalOp;
use crate::operators::{Operator, OperatorExpr};
use crate::properties::PropertySet;
use crate::rules::implementation::{
    GetToDummyScanRule, GetToIndexScanRule, GetToSeqScanRule, ImplementDistinctRule, ImplementLimitRule,
    InnerJoinToInnerHashJoinRule, InnerJoinToInnerNLJoinRule, LogicalAggregateToPhysicalRule,
    LogicalDeleteToPhysicalRule, LogicalGroupByToHashGroupByRule, LogicalInsertSelectToPhysicalRule,
    LogicalInsertToPhysicalRule, LogicalQueryDerivedGetToPhysicalRule, LogicalUpdateToPhysicalRule,
};
use crate::rules::pattern::Pattern;
use crate::rules::rewrite::{CombineConsecutiveFilterRule, EmbedFilterIntoGetRule, PushFilterThroughJoinRule};
use crate::rules::transformation::{InnerJoinAssociativityRule, InnerJoinCommutativityRule};

pub mod enforcers;
pub mod implementation;
pub mod pattern;
pub mod rewrite;
pub mod transformation;

/// An opaque identifier of an optimization rule. Identifiers are dense indexes into the
/// rule catalog and double as the tie-break order between rules of equal promise.
pub type RuleId = usize;

/// Classifies what a rule produces.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RuleType {
    /// Transformation rules produce equivalent logical expressions.
    Transformation,
    /// Implementation rules produce physical expressions.
    Implementation,
    /// Rewrite rules produce strictly better logical expressions and are applied
    /// exhaustively before the cost-based search.
    Rewrite,
}

/// Provides the state a rule may consult: the properties required from the expression
/// being optimized and the memo (for group alias sets).
pub struct RuleContext<'m> {
    required_properties: Rc<PropertySet>,
    memo: &'m Memo,
}

impl<'m> RuleContext<'m> {
    pub fn new(required_properties: Rc<PropertySet>, memo: &'m Memo) -> Self {
        RuleContext {
            required_properties,
            memo,
        }
    }

    pub fn required_properties(&self) -> &PropertySet {
        &self.required_properties
    }

    pub fn memo(&self) -> &Memo {
        self.memo
    }
}

/// An optimization rule. A rule matches expressions shaped like its [pattern](Self::pattern)
/// and transforms each binding into replacement expressions.
pub trait Rule {
    /// The name of this rule.
    fn name(&self) -> String;

    /// Returns the type of this rule.
    fn rule_type(&self) -> RuleType;

    /// The pattern this rule matches. Patterns are built once and shared across invocations.
    fn pattern(&self) -> &Pattern;

    /// A non-negative priority of this rule for the given expression; `0` means "do not apply".
    /// Implementation rules outrank transformations so that physical plans exist early and
    /// seed the cost upper bound.
    fn promise(&self, _expr: &GroupExpression, _ctx: &RuleContext) -> usize {
        match self.rule_type() {
            RuleType::Implementation => 2,
            RuleType::Transformation | RuleType::Rewrite => 1,
        }
    }

    /// Checks whether this rule can be applied to the given binding.
    fn check(&self, expr: &OperatorExpr, ctx: &RuleContext) -> bool;

    /// Applies this rule to the given binding and returns the replacement expressions.
    fn apply(&self, expr: &OperatorExpr, ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError>;
}

impl Debug for dyn Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ name={}, type={:?} }}", self.name(), self.rule_type())
    }
}

/// A fixed catalog of rules. Rule identifiers are assigned in catalog order and stay
/// stable for the lifetime of the rule set.
pub struct StaticRuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl StaticRuleSet {
    /// Creates a rule set from the given collection of rules.
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Result<Self, OptimizerError> {
        // Applied rules are tracked per group expression in a 64-bit set.
        if rules.len() > 64 {
            return Err(OptimizerError::argument(format!("Too many rules: {}", rules.len())));
        }
        Ok(StaticRuleSet { rules })
    }

    /// Returns an iterator over the rules with their identifiers.
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &dyn Rule)> {
        self.rules.iter().enumerate().map(|(id, rule)| (id, rule.as_ref()))
    }

    /// Returns a rule with the given identifier.
    pub fn rule(&self, id: RuleId) -> Result<&dyn Rule, OptimizerError> {
        self.rules
            .get(id)
            .map(|r| r.as_ref())
            .ok_or_else(|| OptimizerError::internal(format!("Rule#{} does not exist", id)))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Debug for StaticRuleSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter().map(|r| r.name())).finish()
    }
}

/// The rules used by the cost-based search phase.
pub fn standard_rules(catalog: CatalogRef) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(InnerJoinCommutativityRule::new()),
        Box::new(InnerJoinAssociativityRule::new()),
        Box::new(GetToDummyScanRule::new()),
        Box::new(GetToSeqScanRule::new(catalog.clone())),
        Box::new(GetToIndexScanRule::new(catalog)),
        Box::new(LogicalQueryDerivedGetToPhysicalRule::new()),
        Box::new(LogicalInsertToPhysicalRule::new()),
        Box::new(LogicalInsertSelectToPhysicalRule::new()),
        Box::new(LogicalUpdateToPhysicalRule::new()),
        Box::new(LogicalDeleteToPhysicalRule::new()),
        Box::new(LogicalGroupByToHashGroupByRule::new()),
        Box::new(LogicalAggregateToPhysicalRule::new()),
        Box::new(InnerJoinToInnerNLJoinRule::new()),
        Box::new(InnerJoinToInnerHashJoinRule::new()),
        Box::new(ImplementDistinctRule::new()),
        Box::new(ImplementLimitRule::new()),
    ]
}

/// The rules used by the rewrite phase.
pub fn rewrite_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(CombineConsecutiveFilterRule::new()),
        Box::new(PushFilterThroughJoinRule::new()),
        Box::new(EmbedFilterIntoGetRule::new()),
    ]
}

/// Returns the memo group a bound [leaf](LogicalOp::Leaf) expression stands for.
pub(crate) fn leaf_group(expr: &OperatorExpr) -> Result<GroupId, OptimizerError> {
    match expr.operator() {
        Operator::Logical(LogicalOp::Leaf(leaf)) => Ok(leaf.group),
        other => Err(OptimizerError::internal(format!("Expected a leaf operator but got: {}", other))),
    }
}
