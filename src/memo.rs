//! Memo data structure.
//!
//! The memo stores every plan the search has seen as a group of logically equivalent
//! expressions. Structurally identical expressions are deduplicated, so the memo is a
//! compact representation of the whole search space. Groups and group expressions live
//! in contiguous arenas and reference each other by dense identifiers, which makes
//! group merging a single-pass remap.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display, Formatter, Write};
use std::sync::Arc;

use itertools::Itertools;

use crate::cost::Cost;
use crate::error::OptimizerError;
use crate::operators::logical::LogicalOp;
use crate::operators::{Operator, OperatorExpr};
use crate::properties::PropertySet;
use crate::statistics::{derive_operator_statistics, StatisticsProvider, TableStatistics};

/// Uniquely identifies a group in a memo.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct GroupId(usize);

impl GroupId {
    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Debug for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GroupId").field(&self.0).finish()
    }
}

/// Uniquely identifies a group expression in a memo.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

impl Display for ExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Debug for ExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ExprId").field(&self.0).finish()
    }
}

/// A set of logically equivalent expressions.
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    table_aliases: HashSet<String>,
    logical_exprs: Vec<ExprId>,
    physical_exprs: Vec<ExprId>,
    enforced_exprs: Vec<ExprId>,
    winners: HashMap<PropertySet, (Cost, ExprId)>,
    has_explored: bool,
    cost_lower_bound: Cost,
    statistics: Option<Arc<TableStatistics>>,
    merged_into: Option<GroupId>,
}

impl Group {
    fn new(id: GroupId, table_aliases: HashSet<String>) -> Self {
        Group {
            id,
            table_aliases,
            logical_exprs: Vec::new(),
            physical_exprs: Vec::new(),
            enforced_exprs: Vec::new(),
            winners: HashMap::new(),
            has_explored: false,
            cost_lower_bound: 0.0,
            statistics: None,
            merged_into: None,
        }
    }

    /// The identifier of this group.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The table aliases the expressions of this group draw rows from.
    pub fn table_aliases(&self) -> &HashSet<String> {
        &self.table_aliases
    }

    /// Logical expressions of this group.
    pub fn logical_expressions(&self) -> &[ExprId] {
        &self.logical_exprs
    }

    /// Physical expressions of this group.
    pub fn physical_expressions(&self) -> &[ExprId] {
        &self.physical_exprs
    }

    /// Expressions produced by the property enforcer. They belong to this group but are
    /// excluded from rule exploration to avoid infinite enforcement loops.
    pub fn enforced_expressions(&self) -> &[ExprId] {
        &self.enforced_exprs
    }

    /// Returns the lowest-cost expression of this group that satisfies the given properties.
    pub fn best_expression(&self, properties: &PropertySet) -> Option<(Cost, ExprId)> {
        self.winners.get(properties).copied()
    }

    /// Records `expr` as a candidate winner for the given properties.
    /// Returns `true` if the candidate became the winner.
    pub(crate) fn set_expression_cost(&mut self, expr: ExprId, cost: Cost, properties: PropertySet) -> bool {
        match self.winners.entry(properties) {
            Entry::Vacant(e) => {
                e.insert((cost, expr));
                true
            }
            Entry::Occupied(mut e) => {
                if cost < e.get().0 {
                    e.insert((cost, expr));
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether the exploration rules have been applied to the logical expressions of this group.
    pub fn has_explored(&self) -> bool {
        self.has_explored
    }

    pub(crate) fn set_explored(&mut self) {
        self.has_explored = true;
    }

    /// A lower bound on the cost of any plan rooted at this group.
    pub fn cost_lower_bound(&self) -> Cost {
        self.cost_lower_bound
    }
}

/// A single member of a group: one operator plus child groups.
#[derive(Debug)]
pub struct GroupExpression {
    id: ExprId,
    group: GroupId,
    operator: Operator,
    children: Vec<GroupId>,
    applied_rules: u64,
    best_properties: HashMap<PropertySet, (Cost, Vec<PropertySet>)>,
    retired: bool,
}

impl GroupExpression {
    /// The identifier of this expression.
    pub fn id(&self) -> ExprId {
        self.id
    }

    /// The group this expression belongs to.
    pub fn group_id(&self) -> GroupId {
        self.group
    }

    /// The operator of this expression.
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Child groups of this expression.
    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    /// Returns `true` if the rule with the given id has already been applied to this expression.
    pub fn has_rule_applied(&self, rule: usize) -> bool {
        self.applied_rules & (1u64 << rule) != 0
    }

    pub(crate) fn mark_rule_applied(&mut self, rule: usize) {
        assert!(rule < 64, "rule identifiers above 63 are not supported: {}", rule);
        self.applied_rules |= 1u64 << rule;
    }

    /// Records the cost and the per-child input properties under the given property-set key,
    /// keeping the lower cost on repeated recordings.
    pub(crate) fn record_property_pair(&mut self, key: PropertySet, cost: Cost, inputs: Vec<PropertySet>) {
        match self.best_properties.entry(key) {
            Entry::Vacant(e) => {
                e.insert((cost, inputs));
            }
            Entry::Occupied(mut e) => {
                if cost < e.get().0 {
                    e.insert((cost, inputs));
                }
            }
        }
    }

    /// Returns the input properties each child must satisfy when this expression is chosen
    /// for the given property-set key.
    pub fn input_properties(&self, key: &PropertySet) -> Option<&(Cost, Vec<PropertySet>)> {
        self.best_properties.get(key)
    }

    /// Returns `true` if this expression was collapsed into another one by a group merge
    /// or replaced by the rewrite phase.
    pub(crate) fn is_retired(&self) -> bool {
        self.retired
    }
}

/// The memo: a deduplicating index of groups and group expressions.
pub struct Memo {
    groups: Vec<Group>,
    exprs: Vec<GroupExpression>,
    expr_index: HashMap<(Operator, Vec<GroupId>), ExprId>,
}

impl Memo {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Memo {
            groups: Vec::new(),
            exprs: Vec::new(),
            expr_index: HashMap::new(),
        }
    }

    /// The number of live groups.
    pub fn num_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.merged_into.is_none()).count()
    }

    /// The number of live group expressions.
    pub fn num_exprs(&self) -> usize {
        self.exprs.iter().filter(|e| !e.retired).count()
    }

    /// Copies the given operator tree into this memo. Shorthand for
    /// [insert_expression](Self::insert_expression) without a target group.
    pub fn insert(&mut self, expr: &OperatorExpr) -> Result<(ExprId, bool), OptimizerError> {
        self.insert_expression(expr, None, false)
    }

    /// Copies the given operator tree into this memo bottom-up.
    ///
    /// * If an identical expression already exists, a reference to it is returned.
    ///   When `target_group` is given and differs from the group of the existing
    ///   expression, the two groups are unioned.
    /// * Otherwise the expression is added to `target_group`, or to a newly created
    ///   group when no target is given.
    ///
    /// [Leaf](LogicalOp::Leaf) children resolve to the memo groups they stand for.
    /// The returned flag is `true` iff a new group expression was created.
    pub fn insert_expression(
        &mut self,
        expr: &OperatorExpr,
        target_group: Option<GroupId>,
        enforced: bool,
    ) -> Result<(ExprId, bool), OptimizerError> {
        if matches!(expr.operator(), Operator::Logical(LogicalOp::Leaf(_))) {
            return Err(OptimizerError::internal("A leaf operator can not be inserted into a memo"));
        }

        let mut child_groups = Vec::with_capacity(expr.children().len());
        for child in expr.children() {
            let group = match child.operator() {
                Operator::Logical(LogicalOp::Leaf(leaf)) => self.resolve(leaf.group)?,
                _ => {
                    let (child_id, _) = self.insert_expression(child, None, false)?;
                    self.exprs[child_id.index()].group
                }
            };
            child_groups.push(group);
        }

        let key = (expr.operator().clone(), child_groups.clone());
        if let Some(&existing) = self.expr_index.get(&key) {
            let existing_group = self.exprs[existing.index()].group;
            if let Some(target) = target_group {
                let target = self.resolve(target)?;
                if target != existing_group {
                    self.merge_groups(existing_group, target)?;
                }
            }
            return Ok((existing, false));
        }

        let group = match target_group {
            Some(target) => self.resolve(target)?,
            None => self.add_group(expr.operator(), &child_groups),
        };

        let id = ExprId(self.exprs.len());
        let group_expr = GroupExpression {
            id,
            group,
            operator: expr.operator().clone(),
            children: child_groups,
            applied_rules: 0,
            best_properties: HashMap::new(),
            retired: false,
        };
        log::debug!("Memo: + expression {} {} in group {}", id, group_expr.operator, group);

        let bucket = match (enforced, group_expr.operator.is_logical()) {
            (true, false) => &mut self.groups[group.index()].enforced_exprs,
            (true, true) => {
                return Err(OptimizerError::internal("Only physical expressions can be enforced"));
            }
            (false, true) => &mut self.groups[group.index()].logical_exprs,
            (false, false) => &mut self.groups[group.index()].physical_exprs,
        };
        bucket.push(id);
        self.exprs.push(group_expr);
        self.expr_index.insert(key, id);

        Ok((id, true))
    }

    fn add_group(&mut self, operator: &Operator, children: &[GroupId]) -> GroupId {
        let mut aliases = match operator {
            Operator::Logical(op) => op.own_aliases(),
            Operator::Physical(_) => HashSet::new(),
        };
        for child in children {
            aliases.extend(self.groups[child.index()].table_aliases.iter().cloned());
        }
        let id = GroupId(self.groups.len());
        self.groups.push(Group::new(id, aliases));
        log::debug!("Memo: + group {}", id);
        id
    }

    /// Follows group-merge forwarding and returns the canonical identifier of the group.
    pub fn resolve(&self, group: GroupId) -> Result<GroupId, OptimizerError> {
        let mut id = group;
        loop {
            let group = self
                .groups
                .get(id.index())
                .ok_or_else(|| OptimizerError::internal(format!("Unknown group: {}", id)))?;
            match group.merged_into {
                Some(next) => id = next,
                None => return Ok(id),
            }
        }
    }

    /// Returns a reference to the group with the given id.
    pub fn group(&self, group: GroupId) -> Result<&Group, OptimizerError> {
        let id = self.resolve(group)?;
        Ok(&self.groups[id.index()])
    }

    pub(crate) fn group_mut(&mut self, group: GroupId) -> Result<&mut Group, OptimizerError> {
        let id = self.resolve(group)?;
        Ok(&mut self.groups[id.index()])
    }

    /// Returns a reference to the group expression with the given id.
    pub fn expr(&self, expr: ExprId) -> Result<&GroupExpression, OptimizerError> {
        self.exprs
            .get(expr.index())
            .ok_or_else(|| OptimizerError::internal(format!("Unknown group expression: {}", expr)))
    }

    pub(crate) fn expr_mut(&mut self, expr: ExprId) -> Result<&mut GroupExpression, OptimizerError> {
        self.exprs
            .get_mut(expr.index())
            .ok_or_else(|| OptimizerError::internal(format!("Unknown group expression: {}", expr)))
    }

    /// Rebuilds the given group expression as an operator tree with leaf children,
    /// the inverse of [insert_expression](Self::insert_expression).
    pub fn extract_expression(&self, expr: ExprId) -> Result<OperatorExpr, OptimizerError> {
        let expr = self.expr(expr)?;
        let children = expr.children().iter().map(|g| OperatorExpr::leaf(*g)).collect();
        Ok(OperatorExpr::new(expr.operator().clone(), children))
    }

    /// Unions two groups: reparents all expressions of `src` into `dst`, redirects all
    /// references to `src`, keeps the lower-cost winner per property set and retires `src`.
    fn merge_groups(&mut self, src: GroupId, dst: GroupId) -> Result<(), OptimizerError> {
        self.do_merge(src, dst)?;
        self.rebuild_index()
    }

    fn do_merge(&mut self, src: GroupId, dst: GroupId) -> Result<(), OptimizerError> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        if src == dst {
            return Ok(());
        }
        log::debug!("Memo: merging group {} into {}", src, dst);

        let logical = std::mem::take(&mut self.groups[src.index()].logical_exprs);
        let physical = std::mem::take(&mut self.groups[src.index()].physical_exprs);
        let enforced = std::mem::take(&mut self.groups[src.index()].enforced_exprs);
        for &expr in logical.iter().chain(physical.iter()).chain(enforced.iter()) {
            self.exprs[expr.index()].group = dst;
        }
        self.groups[dst.index()].logical_exprs.extend(logical);
        self.groups[dst.index()].physical_exprs.extend(physical);
        self.groups[dst.index()].enforced_exprs.extend(enforced);

        let aliases = std::mem::take(&mut self.groups[src.index()].table_aliases);
        self.groups[dst.index()].table_aliases.extend(aliases);

        let winners: Vec<_> = self.groups[src.index()].winners.drain().collect();
        for (properties, (cost, expr)) in winners {
            self.groups[dst.index()].set_expression_cost(expr, cost, properties);
        }

        if self.groups[dst.index()].statistics.is_none() {
            self.groups[dst.index()].statistics = self.groups[src.index()].statistics.take();
        }
        self.groups[src.index()].merged_into = Some(dst);
        Ok(())
    }

    /// Remaps child group references to their canonical groups and rebuilds the
    /// deduplication index until a fixed point: expressions that became structurally
    /// identical collapse into one entry, and when the collapsed expressions lived in
    /// different groups those groups now share a member and are unioned as well.
    fn rebuild_index(&mut self) -> Result<(), OptimizerError> {
        loop {
            let canonical: Vec<GroupId> =
                (0..self.groups.len()).map(|i| self.resolve(GroupId(i))).collect::<Result<_, _>>()?;

            for expr in self.exprs.iter_mut().filter(|e| !e.retired) {
                expr.group = canonical[expr.group.index()];
                for child in expr.children.iter_mut() {
                    *child = canonical[child.index()];
                }
            }

            let mut index = HashMap::new();
            let mut duplicate = None;
            for expr in self.exprs.iter().filter(|e| !e.retired) {
                let key = (expr.operator.clone(), expr.children.clone());
                match index.entry(key) {
                    Entry::Vacant(e) => {
                        e.insert(expr.id);
                    }
                    Entry::Occupied(e) => {
                        duplicate = Some((expr.id, *e.get()));
                        break;
                    }
                }
            }
            self.expr_index = index;

            match duplicate {
                None => return Ok(()),
                Some((duplicate, kept)) => {
                    let duplicate_group = self.exprs[duplicate.index()].group;
                    let kept_group = self.exprs[kept.index()].group;
                    self.do_merge(duplicate_group, kept_group)?;
                    self.retire_duplicate(duplicate, kept);
                }
            }
        }
    }

    fn retire_duplicate(&mut self, duplicate: ExprId, kept: ExprId) {
        log::debug!("Memo: expression {} collapsed into {}", duplicate, kept);

        self.exprs[duplicate.index()].retired = true;
        let group = self.exprs[duplicate.index()].group;
        let group = &mut self.groups[group.index()];
        group.logical_exprs.retain(|e| *e != duplicate);
        group.physical_exprs.retain(|e| *e != duplicate);
        group.enforced_exprs.retain(|e| *e != duplicate);
        for winner in group.winners.values_mut() {
            if winner.1 == duplicate {
                winner.1 = kept;
            }
        }

        let best_properties = std::mem::take(&mut self.exprs[duplicate.index()].best_properties);
        for (key, (cost, inputs)) in best_properties {
            self.exprs[kept.index()].record_property_pair(key, cost, inputs);
        }
        let applied = self.exprs[duplicate.index()].applied_rules;
        self.exprs[kept.index()].applied_rules |= applied;
    }

    /// Replaces the logical expressions of the given group with `expr`. Used by the
    /// rewrite phase, where every group holds a single logical expression and a
    /// successful rewrite substitutes it in place.
    pub fn replace_logical_expression(
        &mut self,
        group: GroupId,
        expr: &OperatorExpr,
    ) -> Result<(ExprId, bool), OptimizerError> {
        let group = self.resolve(group)?;
        let old_exprs = std::mem::take(&mut self.groups[group.index()].logical_exprs);
        for old in old_exprs {
            let old_expr = &mut self.exprs[old.index()];
            old_expr.retired = true;
            let key = (old_expr.operator.clone(), old_expr.children.clone());
            self.expr_index.remove(&key);
        }
        // Rows produced by the group do not change, but cached statistics may have been
        // derived from the replaced expression.
        self.groups[group.index()].statistics = None;
        self.insert_expression(expr, Some(group), false)
    }

    /// Returns the statistics of the rows produced by the given group, deriving and
    /// caching them on first use.
    pub fn statistics(
        &mut self,
        group: GroupId,
        provider: &dyn StatisticsProvider,
    ) -> Result<Arc<TableStatistics>, OptimizerError> {
        let group = self.resolve(group)?;
        if let Some(statistics) = &self.groups[group.index()].statistics {
            return Ok(statistics.clone());
        }

        let expr = self.groups[group.index()]
            .logical_exprs
            .first()
            .copied()
            .ok_or_else(|| OptimizerError::internal(format!("Group {} has no logical expressions", group)))?;
        let (operator, children) = {
            let expr = &self.exprs[expr.index()];
            (expr.operator.clone(), expr.children.clone())
        };

        let mut child_statistics = Vec::with_capacity(children.len());
        for child in children {
            child_statistics.push(self.statistics(child, provider)?);
        }

        let statistics = Arc::new(derive_operator_statistics(&operator, &child_statistics, provider)?);
        self.groups[group.index()].statistics = Some(statistics.clone());
        Ok(statistics)
    }

    /// Live group identifiers in creation order.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().filter(|g| g.merged_into.is_none()).map(|g| g.id).collect()
    }
}

impl Default for Memo {
    fn default() -> Self {
        Memo::new()
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("num_groups", &self.num_groups())
            .field("num_exprs", &self.num_exprs())
            .finish()
    }
}

/// Builds a textual representation of the given memo:
///
/// ```text
/// 02 LogicalInnerJoin preds=[] [00 01] | NLJoin preds=[] [00 01]
/// 01 LogicalGet b
/// 00 LogicalGet a
/// ```
pub fn format_memo(memo: &Memo) -> String {
    let mut buf = String::new();
    for group in memo.groups.iter().rev().filter(|g| g.merged_into.is_none()) {
        let exprs = group
            .logical_exprs
            .iter()
            .chain(group.physical_exprs.iter())
            .chain(group.enforced_exprs.iter())
            .map(|id| {
                let expr = &memo.exprs[id.index()];
                if expr.children.is_empty() {
                    format!("{}", expr.operator)
                } else {
                    format!("{} [{}]", expr.operator, expr.children.iter().join(" "))
                }
            })
            .join(" | ");
        let _ = writeln!(buf, "{} {}", group.id, exprs);
    }
    buf
}
