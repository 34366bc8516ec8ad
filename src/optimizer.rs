//! Cost-based optimizer.
//!
//! The search is driven by an explicit LIFO stack of tasks. A task that depends on a
//! sub-result pushes itself back onto the stack before pushing the dependent task, so
//! the recursion of the search is unwound into an iterative pop-driven drain and the
//! cost budget of branch-and-bound pruning flows through the task contexts.

use std::cell::Cell;
use std::collections::HashSet;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use std::sync::Arc;

use crate::catalog::CatalogRef;
use crate::cost::{Cost, CostEstimationContext, CostEstimator};
use crate::error::OptimizerError;
use crate::memo::{format_memo, ExprId, GroupId, Memo};
use crate::operators::physical::PhysicalOp;
use crate::operators::OperatorExpr;
use crate::properties::derive::derive_child_properties;
use crate::properties::PropertySet;
use crate::rules::pattern::bind_pattern;
use crate::rules::{enforcers, rewrite_rules, standard_rules, RuleContext, RuleId, RuleType, StaticRuleSet};
use crate::statistics::StatisticsProvider;

/// A physical plan produced by the optimizer: the chosen operators, the properties each
/// of them satisfies and the accumulated cost of every subtree.
#[derive(Debug, Clone)]
pub struct PhysicalPlan {
    operator: PhysicalOp,
    properties: PropertySet,
    cost: Cost,
    inputs: Vec<PhysicalPlan>,
}

impl PhysicalPlan {
    /// The operator at the root of this plan.
    pub fn operator(&self) -> &PhysicalOp {
        &self.operator
    }

    /// The properties this operator satisfies.
    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    /// The cost of this plan, inputs included.
    pub fn cost(&self) -> Cost {
        self.cost
    }

    /// Input plans.
    pub fn inputs(&self) -> &[PhysicalPlan] {
        &self.inputs
    }
}

impl Display for PhysicalPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn format_plan(plan: &PhysicalPlan, depth: usize, f: &mut Formatter<'_>) -> std::fmt::Result {
            if depth > 0 {
                writeln!(f)?;
            }
            write!(f, "{:indent$}{}", "", plan.operator, indent = depth * 2)?;
            if !plan.properties.is_empty() {
                write!(f, " {}", plan.properties)?;
            }
            for input in plan.inputs.iter() {
                format_plan(input, depth + 1, f)?;
            }
            Ok(())
        }
        format_plan(self, 0, f)
    }
}

/// The state shared by all tasks spawned for one `(group, required properties)` pair:
/// the required properties and the remaining cost budget.
pub struct OptimizeContext {
    required_properties: Rc<PropertySet>,
    cost_upper_bound: Cell<Cost>,
}

impl OptimizeContext {
    pub fn new(required_properties: Rc<PropertySet>, cost_upper_bound: Cost) -> Self {
        OptimizeContext {
            required_properties,
            cost_upper_bound: Cell::new(cost_upper_bound),
        }
    }

    pub fn required_properties(&self) -> &PropertySet {
        &self.required_properties
    }

    fn required(&self) -> Rc<PropertySet> {
        self.required_properties.clone()
    }

    pub fn cost_upper_bound(&self) -> Cost {
        self.cost_upper_bound.get()
    }

    fn set_cost_upper_bound(&self, bound: Cost) {
        self.cost_upper_bound.set(bound);
    }
}

impl Display for OptimizeContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ required: {}", self.required_properties)?;
        let bound = self.cost_upper_bound.get();
        if bound.is_finite() {
            write!(f, " bound: {:.4}", bound)?;
        }
        write!(f, " }}")
    }
}

type PropertyPair = (PropertySet, Vec<PropertySet>);

/// Resume state of an [OptimizeInputs](Task::OptimizeInputs) task. The task owns exactly
/// what it needs to continue after the optimization of a child group completes.
struct OptimizeInputsState {
    expr: ExprId,
    pairs: Option<Rc<Vec<PropertyPair>>>,
    pair_idx: usize,
    child_idx: usize,
    prev_child_idx: Option<usize>,
    total_cost: Cost,
}

impl OptimizeInputsState {
    fn new(expr: ExprId) -> Self {
        OptimizeInputsState {
            expr,
            pairs: None,
            pair_idx: 0,
            child_idx: 0,
            prev_child_idx: None,
            total_cost: 0.0,
        }
    }
}

enum Task {
    OptimizeGroup { group: GroupId, ctx: Rc<OptimizeContext> },
    ExploreGroup { group: GroupId, ctx: Rc<OptimizeContext> },
    OptimizeExpression { expr: ExprId, ctx: Rc<OptimizeContext> },
    ExploreExpression { expr: ExprId, ctx: Rc<OptimizeContext> },
    ApplyRule { expr: ExprId, rule: RuleId, ctx: Rc<OptimizeContext> },
    OptimizeInputs { state: OptimizeInputsState, ctx: Rc<OptimizeContext> },
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::OptimizeGroup { group, ctx } => write!(f, "OptimizeGroup: group {} ctx: {}", group, ctx),
            Task::ExploreGroup { group, ctx } => write!(f, "ExploreGroup: group {} ctx: {}", group, ctx),
            Task::OptimizeExpression { expr, ctx } => write!(f, "OptimizeExpression: expr {} ctx: {}", expr, ctx),
            Task::ExploreExpression { expr, ctx } => write!(f, "ExploreExpression: expr {} ctx: {}", expr, ctx),
            Task::ApplyRule { expr, rule, ctx } => {
                write!(f, "ApplyRule: expr {} rule#{} ctx: {}", expr, rule, ctx)
            }
            Task::OptimizeInputs { state, ctx } => write!(
                f,
                "OptimizeInputs: expr {} pair: {} child: {} cost: {:.4} ctx: {}",
                state.expr, state.pair_idx, state.child_idx, state.total_cost, ctx
            ),
        }
    }
}

#[derive(Default)]
struct TaskStack {
    tasks: Vec<Task>,
}

impl TaskStack {
    fn push(&mut self, task: Task) {
        log::debug!(" + {}", task);
        self.tasks.push(task);
    }

    fn pop(&mut self) -> Option<Task> {
        self.tasks.pop()
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[derive(Debug, Clone, Default)]
struct Stats {
    number_of_tasks: usize,
    max_stack_depth: usize,
    tasks: TaskStats,
}

#[derive(Debug, Clone, Default)]
struct TaskStats {
    optimize_group: usize,
    explore_group: usize,
    optimize_expression: usize,
    explore_expression: usize,
    apply_rule: usize,
    optimize_inputs: usize,
}

/// Cost-based optimizer.
pub struct Optimizer<T> {
    rule_set: Rc<StaticRuleSet>,
    rewrite_rule_set: Rc<StaticRuleSet>,
    cost_estimator: Rc<T>,
    statistics: Arc<dyn StatisticsProvider>,
}

impl<T> Optimizer<T>
where
    T: CostEstimator,
{
    /// Creates a new instance of `Optimizer`.
    pub fn new(
        rule_set: Rc<StaticRuleSet>,
        rewrite_rule_set: Rc<StaticRuleSet>,
        cost_estimator: Rc<T>,
        statistics: Arc<dyn StatisticsProvider>,
    ) -> Self {
        Optimizer {
            rule_set,
            rewrite_rule_set,
            cost_estimator,
            statistics,
        }
    }

    /// Creates an optimizer with the built-in rule catalog.
    pub fn with_standard_rules(
        catalog: CatalogRef,
        cost_estimator: Rc<T>,
        statistics: Arc<dyn StatisticsProvider>,
    ) -> Result<Self, OptimizerError> {
        let rule_set = Rc::new(StaticRuleSet::new(standard_rules(catalog))?);
        let rewrite_rule_set = Rc::new(StaticRuleSet::new(rewrite_rules())?);
        Ok(Optimizer::new(rule_set, rewrite_rule_set, cost_estimator, statistics))
    }

    /// Optimizes the given operator tree and returns the lowest-cost physical plan that
    /// satisfies `required_properties`.
    ///
    /// The logical plan is copied into the memo, rewrite rules run to their fixed point,
    /// and the cost-based search drains the task stack starting from an `OptimizeGroup`
    /// task for the root group with an unbounded cost budget. The best plan is then read
    /// back from the per-group winners.
    pub fn optimize(
        &self,
        expr: &OperatorExpr,
        required_properties: PropertySet,
        memo: &mut Memo,
    ) -> Result<PhysicalPlan, OptimizerError> {
        log::debug!("Optimizing expression:\n{}", expr);

        let (root_expr, _) = memo.insert(expr)?;
        let root_group = memo.expr(root_expr)?.group_id();

        self.rewrite(memo)?;
        let root_group = memo.resolve(root_group)?;
        log::debug!("Memo after rewrite:\n{}", format_memo(memo));

        let required_properties = Rc::new(required_properties);
        let root_ctx = Rc::new(OptimizeContext::new(required_properties.clone(), f64::INFINITY));

        let stats = {
            let mut runner = TaskRunner {
                memo: &mut *memo,
                rules: self.rule_set.as_ref(),
                cost_estimator: self.cost_estimator.as_ref(),
                statistics: self.statistics.as_ref(),
                tasks: TaskStack::default(),
                stats: Stats::default(),
            };
            runner.tasks.push(Task::OptimizeGroup {
                group: root_group,
                ctx: root_ctx,
            });
            runner.run()?;
            runner.stats
        };

        log::debug!("Stats: {:?}", stats);
        log::debug!("Final memo:\n{}", format_memo(memo));

        build_plan(memo, root_group, &required_properties)
    }

    /// Applies the rewrite rule set to the memo until a fixed point is reached. Every
    /// successful rewrite replaces the single logical expression of its group.
    fn rewrite(&self, memo: &mut Memo) -> Result<(), OptimizerError> {
        let mut applied: HashSet<(ExprId, RuleId)> = HashSet::new();
        while self.rewrite_pass(memo, &mut applied)? {}
        Ok(())
    }

    fn rewrite_pass(
        &self,
        memo: &mut Memo,
        applied: &mut HashSet<(ExprId, RuleId)>,
    ) -> Result<bool, OptimizerError> {
        // Top-down: groups created later sit closer to the root of the plan, so parent
        // filters are merged and pushed before their children are rewritten.
        let groups: Vec<GroupId> = memo.group_ids().into_iter().rev().collect();
        for group in groups {
            let group = memo.resolve(group)?;
            let expr = match memo.group(group)?.logical_expressions().first() {
                Some(expr) => *expr,
                None => continue,
            };
            for (rule_id, rule) in self.rewrite_rule_set.rules() {
                if !applied.insert((expr, rule_id)) {
                    continue;
                }
                let bindings: Vec<OperatorExpr> = bind_pattern(memo, expr, rule.pattern())?.collect();
                let mut outputs = Vec::new();
                {
                    let ctx = RuleContext::new(Rc::new(PropertySet::new()), memo);
                    for binding in bindings.iter() {
                        if !rule.check(binding, &ctx) {
                            continue;
                        }
                        outputs = rule.apply(binding, &ctx)?;
                        if !outputs.is_empty() {
                            break;
                        }
                    }
                }
                if let Some(output) = outputs.first() {
                    log::debug!("Rewrite: {} rewrites group {}", rule.name(), group);
                    memo.replace_logical_expression(group, output)?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl<T> Debug for Optimizer<T>
where
    T: CostEstimator,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("rule_set", self.rule_set.as_ref())
            .field("rewrite_rule_set", self.rewrite_rule_set.as_ref())
            .field("cost_estimator", self.cost_estimator.as_ref())
            .finish()
    }
}

struct TaskRunner<'a, T> {
    memo: &'a mut Memo,
    rules: &'a StaticRuleSet,
    cost_estimator: &'a T,
    statistics: &'a dyn StatisticsProvider,
    tasks: TaskStack,
    stats: Stats,
}

impl<'a, T> TaskRunner<'a, T>
where
    T: CostEstimator,
{
    fn run(&mut self) -> Result<(), OptimizerError> {
        while let Some(task) = self.tasks.pop() {
            log::debug!("{}", task);

            self.stats.number_of_tasks += 1;
            self.stats.max_stack_depth = self.stats.max_stack_depth.max(self.tasks.len() + 1);

            match task {
                Task::OptimizeGroup { group, ctx } => self.optimize_group(group, ctx)?,
                Task::ExploreGroup { group, ctx } => self.explore_group(group, ctx)?,
                Task::OptimizeExpression { expr, ctx } => self.optimize_expression(expr, ctx, false)?,
                Task::ExploreExpression { expr, ctx } => self.optimize_expression(expr, ctx, true)?,
                Task::ApplyRule { expr, rule, ctx } => self.apply_rule(expr, rule, ctx)?,
                Task::OptimizeInputs { state, ctx } => self.optimize_inputs(state, ctx)?,
            }
        }
        Ok(())
    }

    fn optimize_group(&mut self, group: GroupId, ctx: Rc<OptimizeContext>) -> Result<(), OptimizerError> {
        self.stats.tasks.optimize_group += 1;

        let group = self.memo.resolve(group)?;
        let (logical, physical) = {
            let group = self.memo.group(group)?;
            if group.cost_lower_bound() > ctx.cost_upper_bound()
                || group.best_expression(ctx.required_properties()).is_some()
            {
                return Ok(());
            }
            let logical = if group.has_explored() {
                Vec::new()
            } else {
                group.logical_expressions().to_vec()
            };
            (logical, group.physical_expressions().to_vec())
        };

        // Logical expressions are pushed first: the LIFO stack then runs the
        // implementation tasks before them, seeding the cost upper bound early.
        for expr in logical {
            self.tasks.push(Task::OptimizeExpression { expr, ctx: ctx.clone() });
        }
        for expr in physical {
            self.tasks.push(Task::OptimizeInputs {
                state: OptimizeInputsState::new(expr),
                ctx: ctx.clone(),
            });
        }

        // The plan tree is acyclic, the flag can be set before the expressions are processed.
        self.memo.group_mut(group)?.set_explored();
        Ok(())
    }

    fn explore_group(&mut self, group: GroupId, ctx: Rc<OptimizeContext>) -> Result<(), OptimizerError> {
        self.stats.tasks.explore_group += 1;

        let group = self.memo.resolve(group)?;
        let logical = {
            let group = self.memo.group(group)?;
            if group.has_explored() {
                return Ok(());
            }
            group.logical_expressions().to_vec()
        };

        for expr in logical {
            self.tasks.push(Task::ExploreExpression { expr, ctx: ctx.clone() });
        }
        self.memo.group_mut(group)?.set_explored();
        Ok(())
    }

    /// Collects the applicable rules for a logical expression and schedules their
    /// application in promise order. During exploration implementation rules are skipped.
    fn optimize_expression(
        &mut self,
        expr: ExprId,
        ctx: Rc<OptimizeContext>,
        explore: bool,
    ) -> Result<(), OptimizerError> {
        if explore {
            self.stats.tasks.explore_expression += 1;
        } else {
            self.stats.tasks.optimize_expression += 1;
        }

        let rules = self.rules;
        if self.memo.expr(expr)?.is_retired() {
            return Ok(());
        }
        let num_children = self.memo.expr(expr)?.children().len();

        let mut valid: Vec<(RuleId, usize)> = Vec::new();
        {
            let rule_ctx = RuleContext::new(ctx.required(), self.memo);
            for (rule_id, rule) in rules.rules() {
                if explore && rule.rule_type() == RuleType::Implementation {
                    continue;
                }
                let group_expr = self.memo.expr(expr)?;
                if group_expr.has_rule_applied(rule_id) {
                    continue;
                }
                if rule.pattern().child_count() != num_children {
                    continue;
                }
                let promise = rule.promise(group_expr, &rule_ctx);
                if promise > 0 {
                    valid.push((rule_id, promise));
                }
            }
        }

        // Push the lowest promise first so that the highest-promise rule ends up on top
        // of the stack. Promise ties are broken by catalog order, lower ids pop first.
        valid.sort_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));

        for (rule_id, _) in valid {
            self.tasks.push(Task::ApplyRule {
                expr,
                rule: rule_id,
                ctx: ctx.clone(),
            });
            // Child groups matched by a non-leaf pattern must be explored before the
            // rule pops, otherwise the binding misses their alternative expressions.
            let rule = rules.rule(rule_id)?;
            let children = self.memo.expr(expr)?.children().to_vec();
            for (child_group, child_pattern) in children.iter().zip(rule.pattern().children()) {
                if child_pattern.child_count() > 0 {
                    self.tasks.push(Task::ExploreGroup {
                        group: *child_group,
                        ctx: ctx.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Enumerates the bindings of the rule's pattern, transforms each binding that passes
    /// the check and inserts the produced expressions into the group of `expr`.
    fn apply_rule(&mut self, expr: ExprId, rule_id: RuleId, ctx: Rc<OptimizeContext>) -> Result<(), OptimizerError> {
        self.stats.tasks.apply_rule += 1;

        if self.memo.expr(expr)?.has_rule_applied(rule_id) {
            return Ok(());
        }
        let rule = self.rules.rule(rule_id)?;

        let bindings: Vec<OperatorExpr> = bind_pattern(self.memo, expr, rule.pattern())?.collect();
        let mut outputs = Vec::new();
        {
            let rule_ctx = RuleContext::new(ctx.required(), self.memo);
            for binding in bindings.iter() {
                if !rule.check(binding, &rule_ctx) {
                    continue;
                }
                outputs.extend(rule.apply(binding, &rule_ctx)?);
            }
        }

        let group = self.memo.expr(expr)?.group_id();
        for output in outputs {
            let (new_expr, is_new) = self.memo.insert_expression(&output, Some(group), false)?;
            if !is_new {
                continue;
            }
            if self.memo.expr(new_expr)?.operator().is_logical() {
                self.tasks.push(Task::OptimizeExpression {
                    expr: new_expr,
                    ctx: ctx.clone(),
                });
            } else {
                self.tasks.push(Task::OptimizeInputs {
                    state: OptimizeInputsState::new(new_expr),
                    ctx: ctx.clone(),
                });
            }
        }

        self.memo.expr_mut(expr)?.mark_rule_applied(rule_id);
        Ok(())
    }

    /// Costs a physical expression: iterates over the `(output, inputs)` property pairs
    /// of the deriver and over the children of the expression left to right. When a child
    /// group has no winner for its input properties yet, the task suspends itself and
    /// pushes an `OptimizeGroup` task for the child with the remaining cost budget.
    fn optimize_inputs(&mut self, mut state: OptimizeInputsState, ctx: Rc<OptimizeContext>) -> Result<(), OptimizerError> {
        self.stats.tasks.optimize_inputs += 1;

        let expr_id = state.expr;
        let (group, children, operator) = {
            let expr = self.memo.expr(expr_id)?;
            if expr.is_retired() {
                return Ok(());
            }
            (expr.group_id(), expr.children().to_vec(), expr.operator().physical()?.clone())
        };

        if state.pairs.is_none() {
            if state.total_cost > ctx.cost_upper_bound() {
                return Ok(());
            }
            let pairs = derive_child_properties(&operator, children.len(), ctx.required_properties());
            state.pairs = Some(Rc::new(pairs));
        }
        let pairs = state.pairs.clone().expect("property pairs have been derived");

        while state.pair_idx < pairs.len() {
            let (output_properties, input_properties) = &pairs[state.pair_idx];

            if state.child_idx == 0 && state.prev_child_idx.is_none() {
                let cost_ctx = self.cost_context(&operator, &children)?;
                state.total_cost = self.cost_estimator.estimate_cost(&operator, &cost_ctx);
            }

            let mut failed = false;
            while state.child_idx < children.len() {
                let child_group = children[state.child_idx];
                let required_input = &input_properties[state.child_idx];

                let winner = self.memo.group(child_group)?.best_expression(required_input);
                if let Some((child_cost, _)) = winner {
                    state.total_cost += child_cost;
                    if state.total_cost > ctx.cost_upper_bound() {
                        failed = true;
                        break;
                    }
                    state.child_idx += 1;
                } else if state.prev_child_idx != Some(state.child_idx) {
                    // First visit of this child: optimize its group, then resume.
                    state.prev_child_idx = Some(state.child_idx);
                    let child_ctx = Rc::new(OptimizeContext::new(
                        Rc::new(required_input.clone()),
                        ctx.cost_upper_bound() - state.total_cost,
                    ));
                    self.tasks.push(Task::OptimizeInputs { state, ctx: ctx.clone() });
                    self.tasks.push(Task::OptimizeGroup {
                        group: child_group,
                        ctx: child_ctx,
                    });
                    return Ok(());
                } else {
                    // Resumed, but the child group still has no winner: the search was
                    // pruned or the child has no implementation under these properties.
                    failed = true;
                    break;
                }
            }

            if !failed && state.child_idx == children.len() {
                self.complete_property_pair(
                    expr_id,
                    group,
                    output_properties,
                    input_properties,
                    state.total_cost,
                    &ctx,
                )?;
            }

            state.pair_idx += 1;
            state.child_idx = 0;
            state.prev_child_idx = None;
            state.total_cost = 0.0;
        }
        Ok(())
    }

    /// All children of a property pair have winners: record the totals, enforce the
    /// required properties the output does not provide, and update the group winners.
    fn complete_property_pair(
        &mut self,
        expr: ExprId,
        group: GroupId,
        output: &PropertySet,
        inputs: &[PropertySet],
        total_cost: Cost,
        ctx: &Rc<OptimizeContext>,
    ) -> Result<(), OptimizerError> {
        self.memo.expr_mut(expr)?.record_property_pair(output.clone(), total_cost, inputs.to_vec());
        self.memo.group_mut(group)?.set_expression_cost(expr, total_cost, output.clone());
        log::debug!("Expr {} costs {:.4} for {}", expr, total_cost, output);

        let required = ctx.required_properties();
        let mut extended = output.clone();
        let mut current_cost = total_cost;
        let mut enforced: Option<ExprId> = None;
        let mut last_input = output.clone();
        let mut meets_requirement = true;

        // Missing properties are enforced in the order they appear in the requirement.
        for property in required.properties() {
            if extended.has_property(property) {
                continue;
            }
            if !enforcers::can_enforce(property) {
                meets_requirement = false;
                break;
            }

            let enforcer = enforcers::create_enforcer(property, group)?;
            let (enforcer_id, _) = self.memo.insert_expression(&enforcer, Some(group), true)?;

            let pre = extended.clone();
            extended.add(property.clone());

            let input_statistics = self.memo.statistics(group, self.statistics)?;
            let cost_ctx = CostEstimationContext {
                inputs: vec![input_statistics],
                base_statistics: None,
            };
            let enforcer_op = self.memo.expr(enforcer_id)?.operator().physical()?.clone();
            current_cost += self.cost_estimator.estimate_cost(&enforcer_op, &cost_ctx);

            self.memo.expr_mut(enforcer_id)?.record_property_pair(extended.clone(), current_cost, vec![pre.clone()]);
            self.memo.group_mut(group)?.set_expression_cost(enforcer_id, current_cost, extended.clone());

            last_input = pre;
            enforced = Some(enforcer_id);
        }

        if meets_requirement {
            // A complete implementation under the required properties tightens the budget.
            if current_cost < ctx.cost_upper_bound() {
                ctx.set_cost_upper_bound(current_cost);
            }
            match enforced {
                Some(enforcer_id) => {
                    self.memo
                        .expr_mut(enforcer_id)?
                        .record_property_pair(required.clone(), current_cost, vec![last_input]);
                    self.memo.group_mut(group)?.set_expression_cost(enforcer_id, current_cost, required.clone());
                }
                None => {
                    self.memo.expr_mut(expr)?.record_property_pair(required.clone(), current_cost, inputs.to_vec());
                    self.memo.group_mut(group)?.set_expression_cost(expr, current_cost, required.clone());
                }
            }
        }
        Ok(())
    }

    fn cost_context(&mut self, operator: &PhysicalOp, children: &[GroupId]) -> Result<CostEstimationContext, OptimizerError> {
        let statistics = self.statistics;
        let mut inputs = Vec::with_capacity(children.len());
        for child in children {
            inputs.push(self.memo.statistics(*child, statistics)?);
        }
        let base_statistics = match operator {
            PhysicalOp::SeqScan(scan) => statistics.table_statistics(&scan.table),
            PhysicalOp::IndexScan(scan) => statistics.table_statistics(&scan.table),
            _ => None,
        };
        Ok(CostEstimationContext { inputs, base_statistics })
    }
}

/// Reconstructs the best physical plan for `group` under the given required properties.
/// Each group contributes its winner; recursion descends with the input properties the
/// winner recorded for its children.
fn build_plan(memo: &Memo, group: GroupId, required: &PropertySet) -> Result<PhysicalPlan, OptimizerError> {
    let group = memo.group(group)?;
    let (cost, winner) = group.best_expression(required).ok_or_else(|| {
        OptimizerError::no_plan_found(format!(
            "group {} has no physical implementation that satisfies {}",
            group.id(),
            required
        ))
    })?;

    let expr = memo.expr(winner)?;
    let input_properties = expr
        .input_properties(required)
        .map(|(_, inputs)| inputs.clone())
        .ok_or_else(|| {
            OptimizerError::internal(format!("Winner {} has no input properties recorded for {}", winner, required))
        })?;

    let mut inputs = Vec::with_capacity(expr.children().len());
    for (child, child_required) in expr.children().iter().zip(input_properties.iter()) {
        inputs.push(build_plan(memo, *child, child_required)?);
    }

    Ok(PhysicalPlan {
        operator: expr.operator().physical()?.clone(),
        properties: required.clone(),
        cost,
        inputs,
    })
}
