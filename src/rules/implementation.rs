//! Implementation rules. See [rules module](super).

use crate::catalog::{CatalogRef, IndexRef};
use crate::error::OptimizerError;
use crate::operators::logical::{LogicalGet, LogicalOp};
use crate::operators::physical::{
    PhysicalAggregate, PhysicalDelete, PhysicalDistinct, PhysicalDummyScan, PhysicalHashGroupBy, PhysicalHashJoin,
    PhysicalIndexScan, PhysicalInsert, PhysicalInsertSelect, PhysicalLimit, PhysicalNLJoin, PhysicalOp,
    PhysicalQueryDerivedScan, PhysicalSeqScan, PhysicalUpdate,
};
use crate::operators::scalar::{column_value_comparison, is_hashable_join_predicate, BinaryOp, ScalarExpr, ScalarExprRef};
use crate::operators::{Operator, OperatorExpr, OperatorType};
use crate::properties::{SortColumn, SortSpec};
use crate::rules::pattern::Pattern;
use crate::rules::{leaf_group, Rule, RuleContext, RuleType};

/// `Get` without a table turns into a scan producing no rows.
pub struct GetToDummyScanRule {
    pattern: Pattern,
}

impl GetToDummyScanRule {
    pub fn new() -> Self {
        GetToDummyScanRule {
            pattern: Pattern::operator(OperatorType::Get, vec![]),
        }
    }
}

impl Rule for GetToDummyScanRule {
    fn name(&self) -> String {
        "GetToDummyScan".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        matches!(expr.operator(), Operator::Logical(LogicalOp::Get(LogicalGet { table: None, .. })))
    }

    fn apply(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        Ok(vec![OperatorExpr::from(PhysicalOp::DummyScan(PhysicalDummyScan {}))])
    }
}

/// `Get` with a table turns into a sequential scan carrying the predicates.
pub struct GetToSeqScanRule {
    catalog: CatalogRef,
    pattern: Pattern,
}

impl GetToSeqScanRule {
    pub fn new(catalog: CatalogRef) -> Self {
        GetToSeqScanRule {
            catalog,
            pattern: Pattern::operator(OperatorType::Get, vec![]),
        }
    }
}

impl Rule for GetToSeqScanRule {
    fn name(&self) -> String {
        "GetToSeqScan".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        matches!(expr.operator(), Operator::Logical(LogicalOp::Get(LogicalGet { table: Some(_), .. })))
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let get = match expr.operator() {
            Operator::Logical(LogicalOp::Get(get)) => get,
            _ => return Ok(Vec::new()),
        };
        let table = match &get.table {
            Some(table) => table,
            None => return Ok(Vec::new()),
        };
        if self.catalog.get_table(table).is_none() {
            return Err(OptimizerError::internal(format!("Table is not found or does not exist: {}", table)));
        }

        Ok(vec![OperatorExpr::from(PhysicalOp::SeqScan(PhysicalSeqScan {
            table: table.clone(),
            alias: get.alias.clone(),
            predicates: get.predicates.clone(),
        }))])
    }
}

/// `Get` turns into an index scan, once per index that either covers the required
/// ordering as a prefix of its key in ascending order, or matches at least one
/// column-versus-constant predicate of the scan.
pub struct GetToIndexScanRule {
    catalog: CatalogRef,
    pattern: Pattern,
}

impl GetToIndexScanRule {
    pub fn new(catalog: CatalogRef) -> Self {
        GetToIndexScanRule {
            catalog,
            pattern: Pattern::operator(OperatorType::Get, vec![]),
        }
    }

    /// The ordering an index traversal produces: the key columns, ascending.
    fn index_ordering(index: &IndexRef, alias: &str) -> SortSpec {
        SortSpec::new(
            index
                .columns()
                .iter()
                .map(|c| SortColumn::asc(ScalarExpr::column(alias, c.name())))
                .collect(),
        )
    }

    /// The required sort columns when they are all ascending base columns of the scanned
    /// relation, in requirement order.
    fn sort_column_names(ctx: &RuleContext, get: &LogicalGet) -> Option<Vec<String>> {
        let sort = ctx.required_properties().sort()?;
        let mut names = Vec::with_capacity(sort.columns().len());
        for column in sort.columns() {
            if !column.ascending {
                return None;
            }
            match column.expr.as_column() {
                Some((alias, name)) if alias == get.alias => names.push(name.to_string()),
                _ => return None,
            }
        }
        Some(names)
    }

    fn index_scans_for_sort(&self, ctx: &RuleContext, get: &LogicalGet, table: &str) -> Vec<OperatorExpr> {
        let sort_columns = match Self::sort_column_names(ctx, get) {
            Some(columns) if !columns.is_empty() => columns,
            _ => return Vec::new(),
        };

        let mut scans = Vec::new();
        for index in self.catalog.get_indexes(table) {
            let key_columns: Vec<_> = index.columns().iter().map(|c| c.name().to_string()).collect();
            let covers = sort_columns.len() <= key_columns.len()
                && sort_columns.iter().zip(key_columns.iter()).all(|(s, k)| s == k);
            if covers {
                scans.push(OperatorExpr::from(PhysicalOp::IndexScan(PhysicalIndexScan {
                    table: table.into(),
                    alias: get.alias.clone(),
                    index: index.name().into(),
                    predicates: get.predicates.clone(),
                    key_columns: vec![],
                    key_operators: vec![],
                    key_values: vec![],
                    ordering: Some(Self::index_ordering(&index, &get.alias)),
                })));
            }
        }
        scans
    }

    fn index_scans_for_predicates(&self, get: &LogicalGet, table: &str) -> Vec<OperatorExpr> {
        // Collect column-versus-constant comparisons over the scanned relation.
        let mut candidates: Vec<(String, BinaryOp, ScalarExprRef)> = Vec::new();
        for predicate in get.predicates.iter() {
            if let Some((alias, name, op, value)) = column_value_comparison(&predicate.expr) {
                if alias == get.alias {
                    candidates.push((name.to_string(), op, value.clone()));
                }
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut scans = Vec::new();
        for index in self.catalog.get_indexes(table) {
            let mut key_columns = Vec::new();
            let mut key_operators = Vec::new();
            let mut key_values = Vec::new();
            for (name, op, value) in candidates.iter() {
                if index.columns().iter().any(|c| c.name() == name) {
                    key_columns.push(name.clone());
                    key_operators.push(*op);
                    key_values.push(value.clone());
                }
            }
            if !key_columns.is_empty() {
                scans.push(OperatorExpr::from(PhysicalOp::IndexScan(PhysicalIndexScan {
                    table: table.into(),
                    alias: get.alias.clone(),
                    index: index.name().into(),
                    predicates: get.predicates.clone(),
                    key_columns,
                    key_operators,
                    key_values,
                    ordering: Some(Self::index_ordering(&index, &get.alias)),
                })));
            }
        }
        scans
    }
}

impl Rule for GetToIndexScanRule {
    fn name(&self) -> String {
        "GetToIndexScan".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        match expr.operator() {
            Operator::Logical(LogicalOp::Get(LogicalGet { table: Some(table), .. })) => {
                !self.catalog.get_indexes(table).is_empty()
            }
            _ => false,
        }
    }

    fn apply(&self, expr: &OperatorExpr, ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let get = match expr.operator() {
            Operator::Logical(LogicalOp::Get(get)) => get,
            _ => return Ok(Vec::new()),
        };
        let table = match &get.table {
            Some(table) => table.clone(),
            None => return Ok(Vec::new()),
        };

        let mut scans = self.index_scans_for_sort(ctx, get, &table);
        scans.extend(self.index_scans_for_predicates(get, &table));
        Ok(scans)
    }
}

/// Wraps a derived-table get into its physical scan.
pub struct LogicalQueryDerivedGetToPhysicalRule {
    pattern: Pattern,
}

impl LogicalQueryDerivedGetToPhysicalRule {
    pub fn new() -> Self {
        LogicalQueryDerivedGetToPhysicalRule {
            pattern: Pattern::operator(OperatorType::QueryDerivedGet, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for LogicalQueryDerivedGetToPhysicalRule {
    fn name(&self) -> String {
        "LogicalQueryDerivedGetToPhysical".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let get = match expr.operator() {
            Operator::Logical(LogicalOp::QueryDerivedGet(get)) => get,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::QueryDerivedScan(PhysicalQueryDerivedScan { alias: get.alias.clone() }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

/// `Insert` with literal rows has no inputs to optimize.
pub struct LogicalInsertToPhysicalRule {
    pattern: Pattern,
}

impl LogicalInsertToPhysicalRule {
    pub fn new() -> Self {
        LogicalInsertToPhysicalRule {
            pattern: Pattern::operator(OperatorType::Insert, vec![]),
        }
    }
}

impl Rule for LogicalInsertToPhysicalRule {
    fn name(&self) -> String {
        "LogicalInsertToPhysical".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let insert = match expr.operator() {
            Operator::Logical(LogicalOp::Insert(insert)) => insert,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::from(PhysicalOp::Insert(PhysicalInsert {
            table: insert.table.clone(),
            columns: insert.columns.clone(),
            values: insert.values.clone(),
        }))])
    }
}

/// `InsertSelect` keeps its input and writes its rows.
pub struct LogicalInsertSelectToPhysicalRule {
    pattern: Pattern,
}

impl LogicalInsertSelectToPhysicalRule {
    pub fn new() -> Self {
        LogicalInsertSelectToPhysicalRule {
            pattern: Pattern::operator(OperatorType::InsertSelect, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for LogicalInsertSelectToPhysicalRule {
    fn name(&self) -> String {
        "LogicalInsertSelectToPhysical".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let insert = match expr.operator() {
            Operator::Logical(LogicalOp::InsertSelect(insert)) => insert,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::InsertSelect(PhysicalInsertSelect { table: insert.table.clone() }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

/// `Update` keeps its input and applies the assignments.
pub struct LogicalUpdateToPhysicalRule {
    pattern: Pattern,
}

impl LogicalUpdateToPhysicalRule {
    pub fn new() -> Self {
        LogicalUpdateToPhysicalRule {
            pattern: Pattern::operator(OperatorType::Update, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for LogicalUpdateToPhysicalRule {
    fn name(&self) -> String {
        "LogicalUpdateToPhysical".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let update = match expr.operator() {
            Operator::Logical(LogicalOp::Update(update)) => update,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::Update(PhysicalUpdate {
                table: update.table.clone(),
                updates: update.updates.clone(),
            }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

/// `Delete` keeps its input and removes its rows.
pub struct LogicalDeleteToPhysicalRule {
    pattern: Pattern,
}

impl LogicalDeleteToPhysicalRule {
    pub fn new() -> Self {
        LogicalDeleteToPhysicalRule {
            pattern: Pattern::operator(OperatorType::Delete, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for LogicalDeleteToPhysicalRule {
    fn name(&self) -> String {
        "LogicalDeleteToPhysical".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let delete = match expr.operator() {
            Operator::Logical(LogicalOp::Delete(delete)) => delete,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::Delete(PhysicalDelete { table: delete.table.clone() }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

/// Grouping is implemented by a hash table over the grouping columns.
pub struct LogicalGroupByToHashGroupByRule {
    pattern: Pattern,
}

impl LogicalGroupByToHashGroupByRule {
    pub fn new() -> Self {
        LogicalGroupByToHashGroupByRule {
            pattern: Pattern::operator(OperatorType::GroupBy, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for LogicalGroupByToHashGroupByRule {
    fn name(&self) -> String {
        "LogicalGroupByToHashGroupBy".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let group_by = match expr.operator() {
            Operator::Logical(LogicalOp::GroupBy(group_by)) => group_by,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::HashGroupBy(PhysicalHashGroupBy {
                columns: group_by.columns.clone(),
                having: group_by.having.clone(),
            }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

/// Aggregation without grouping.
pub struct LogicalAggregateToPhysicalRule {
    pattern: Pattern,
}

impl LogicalAggregateToPhysicalRule {
    pub fn new() -> Self {
        LogicalAggregateToPhysicalRule {
            pattern: Pattern::operator(OperatorType::Aggregate, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for LogicalAggregateToPhysicalRule {
    fn name(&self) -> String {
        "LogicalAggregateToPhysical".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let aggregate = match expr.operator() {
            Operator::Logical(LogicalOp::Aggregate(aggregate)) => aggregate,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::Aggregate(PhysicalAggregate {
                aggr_exprs: aggregate.aggr_exprs.clone(),
            }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

/// Nested-loop join applies to any inner join.
pub struct InnerJoinToInnerNLJoinRule {
    pattern: Pattern,
}

impl InnerJoinToInnerNLJoinRule {
    pub fn new() -> Self {
        InnerJoinToInnerNLJoinRule {
            pattern: Pattern::operator(OperatorType::InnerJoin, vec![Pattern::leaf(), Pattern::leaf()]),
        }
    }
}

impl Rule for InnerJoinToInnerNLJoinRule {
    fn name(&self) -> String {
        "InnerJoinToInnerNLJoin".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
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
        Ok(vec![OperatorExpr::new(
            PhysicalOp::NLJoin(PhysicalNLJoin {
                predicates: join.predicates.clone(),
            }),
            vec![expr.child(0)?.clone(), expr.child(1)?.clone()],
        )])
    }
}

/// Hash join applies when at least one join predicate is an equality with one side
/// referencing only the left input and the other side only the right input.
pub struct InnerJoinToInnerHashJoinRule {
    pattern: Pattern,
}

impl InnerJoinToInnerHashJoinRule {
    pub fn new() -> Self {
        InnerJoinToInnerHashJoinRule {
            pattern: Pattern::operator(OperatorType::InnerJoin, vec![Pattern::leaf(), Pattern::leaf()]),
        }
    }
}

impl Rule for InnerJoinToInnerHashJoinRule {
    fn name(&self) -> String {
        "InnerJoinToInnerHashJoin".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, expr: &OperatorExpr, ctx: &RuleContext) -> bool {
        let join = match expr.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            _ => return false,
        };
        let aliases = expr.children().iter().take(2).map(|child| {
            let group = leaf_group(child)?;
            Ok(ctx.memo().group(group)?.table_aliases().clone())
        });
        let aliases: Result<Vec<_>, OptimizerError> = aliases.collect();
        match aliases {
            Ok(aliases) if aliases.len() == 2 => join
                .predicates
                .iter()
                .any(|p| is_hashable_join_predicate(&aliases[0], &aliases[1], p)),
            _ => false,
        }
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let join = match expr.operator() {
            Operator::Logical(LogicalOp::InnerJoin(join)) => join,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::HashJoin(PhysicalHashJoin {
                predicates: join.predicates.clone(),
            }),
            vec![expr.child(0)?.clone(), expr.child(1)?.clone()],
        )])
    }
}

/// Duplicate elimination.
pub struct ImplementDistinctRule {
    pattern: Pattern,
}

impl ImplementDistinctRule {
    pub fn new() -> Self {
        ImplementDistinctRule {
            pattern: Pattern::operator(OperatorType::Distinct, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for ImplementDistinctRule {
    fn name(&self) -> String {
        "ImplementDistinct".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let distinct = match expr.operator() {
            Operator::Logical(LogicalOp::Distinct(distinct)) => distinct,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::Distinct(PhysicalDistinct {
                columns: distinct.columns.clone(),
            }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

/// Limit/offset.
pub struct ImplementLimitRule {
    pattern: Pattern,
}

impl ImplementLimitRule {
    pub fn new() -> Self {
        ImplementLimitRule {
            pattern: Pattern::operator(OperatorType::Limit, vec![Pattern::leaf()]),
        }
    }
}

impl Rule for ImplementLimitRule {
    fn name(&self) -> String {
        "ImplementLimit".into()
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn check(&self, _expr: &OperatorExpr, _ctx: &RuleContext) -> bool {
        true
    }

    fn apply(&self, expr: &OperatorExpr, _ctx: &RuleContext) -> Result<Vec<OperatorExpr>, OptimizerError> {
        let limit = match expr.operator() {
            Operator::Logical(LogicalOp::Limit(limit)) => limit,
            _ => return Ok(Vec::new()),
        };
        Ok(vec![OperatorExpr::new(
            PhysicalOp::Limit(PhysicalLimit {
                offset: limit.offset,
                limit: limit.limit,
            }),
            vec![expr.child(0)?.clone()],
        )])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::mutable::MutableCatalog;
    use crate::catalog::{Catalog, IndexBuilder, TableBuilder};
    use crate::datatypes::DataType;
    use crate::memo::Memo;
    use crate::operators::logical::LogicalInnerJoin;
    use crate::operators::physical::PhysicalOp;
    use crate::operators::scalar::{AnnotatedExpr, ScalarValue};
    use crate::properties::{Property, PropertySet};
    use crate::rules::pattern::bind_pattern;
    use std::rc::Rc;
    use std::sync::Arc;

    fn catalog_with_table() -> CatalogRef {
        let catalog = MutableCatalog::new();
        let table = TableBuilder::new("A")
            .add_column("a1", DataType::Int32)
            .add_column("a2", DataType::Int32)
            .build()
            .unwrap();
        catalog.add_table(table);
        let table = catalog.get_table("A").unwrap();
        catalog.add_index(IndexBuilder::new(table, "A_a1_idx").add_column("a1").build().unwrap());
        Arc::new(catalog)
    }

    fn get(alias: &str, table: Option<&str>, predicates: Vec<AnnotatedExpr>) -> OperatorExpr {
        OperatorExpr::from(LogicalOp::Get(LogicalGet {
            table: table.map(|t| t.to_string()),
            alias: alias.into(),
            predicates,
        }))
    }

    fn bindings_for<R>(memo: &Memo, rule: &R, expr: crate::memo::ExprId) -> Vec<OperatorExpr>
    where
        R: Rule,
    {
        bind_pattern(memo, expr, rule.pattern()).unwrap().collect()
    }

    #[test]
    fn test_get_to_seq_scan() {
        let mut memo = Memo::new();
        let pred = AnnotatedExpr::new(ScalarExpr::binary(
            ScalarExpr::column("a", "a1"),
            BinaryOp::Gt,
            ScalarExpr::value(ScalarValue::Int32(5)),
        ));
        let (expr, _) = memo.insert(&get("a", Some("A"), vec![pred])).unwrap();

        let rule = GetToSeqScanRule::new(catalog_with_table());
        let bindings = bindings_for(&memo, &rule, expr);
        assert_eq!(bindings.len(), 1);

        let ctx = RuleContext::new(Rc::new(PropertySet::new()), &memo);
        assert!(rule.check(&bindings[0], &ctx));
        let outputs = rule.apply(&bindings[0], &ctx).unwrap();

        match outputs[0].operator() {
            Operator::Physical(PhysicalOp::SeqScan(scan)) => {
                assert_eq!(scan.table, "A");
                assert_eq!(scan.predicates.len(), 1, "predicates are carried by the scan");
            }
            other => panic!("Unexpected operator: {}", other),
        }
    }

    #[test]
    fn test_get_to_dummy_scan_requires_missing_table() {
        let mut memo = Memo::new();
        let (no_table, _) = memo.insert(&get("a", None, vec![])).unwrap();
        let (with_table, _) = memo.insert(&get("b", Some("A"), vec![])).unwrap();

        let rule = GetToDummyScanRule::new();
        let ctx = RuleContext::new(Rc::new(PropertySet::new()), &memo);

        let bindings = bindings_for(&memo, &rule, no_table);
        assert!(rule.check(&bindings[0], &ctx));

        let bindings = bindings_for(&memo, &rule, with_table);
        assert!(!rule.check(&bindings[0], &ctx));
    }

    #[test]
    fn test_get_to_index_scan_for_ordering() {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&get("a", Some("A"), vec![])).unwrap();

        let rule = GetToIndexScanRule::new(catalog_with_table());
        let required = PropertySet::with_property(Property::Sort(SortSpec::ascending(vec![ScalarExpr::column(
            "a", "a1",
        )])));
        let ctx = RuleContext::new(Rc::new(required), &memo);

        let bindings = bindings_for(&memo, &rule, expr);
        assert!(rule.check(&bindings[0], &ctx));
        let outputs = rule.apply(&bindings[0], &ctx).unwrap();
        assert_eq!(outputs.len(), 1);

        match outputs[0].operator() {
            Operator::Physical(PhysicalOp::IndexScan(scan)) => {
                assert_eq!(scan.index, "A_a1_idx");
                assert!(scan.key_columns.is_empty());
                assert!(scan.ordering.is_some());
            }
            other => panic!("Unexpected operator: {}", other),
        }
    }

    #[test]
    fn test_get_to_index_scan_skips_descending_or_foreign_ordering() {
        let mut memo = Memo::new();
        let (expr, _) = memo.insert(&get("a", Some("A"), vec![])).unwrap();
        let rule = GetToIndexScanRule::new(catalog_with_table());
        let bindings = bindings_for(&memo, &rule, expr);

        let descending = PropertySet::with_property(Property::Sort(SortSpec::new(vec![SortColumn::desc(
            ScalarExpr::column("a", "a1"),
        )])));
        let ctx = RuleContext::new(Rc::new(descending), &memo);
        assert!(rule.apply(&bindings[0], &ctx).unwrap().is_empty());

        let foreign = PropertySet::with_property(Property::Sort(SortSpec::ascending(vec![ScalarExpr::column(
            "b", "b1",
        )])));
        let ctx = RuleContext::new(Rc::new(foreign), &memo);
        assert!(rule.apply(&bindings[0], &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_get_to_index_scan_for_predicates() {
        let mut memo = Memo::new();
        let pred = AnnotatedExpr::new(ScalarExpr::binary(
            ScalarExpr::value(ScalarValue::Int32(10)),
            BinaryOp::Gt,
            ScalarExpr::column("a", "a1"),
        ));
        let (expr, _) = memo.insert(&get("a", Some("A"), vec![pred])).unwrap();

        let rule = GetToIndexScanRule::new(catalog_with_table());
        let ctx = RuleContext::new(Rc::new(PropertySet::new()), &memo);
        let bindings = bindings_for(&memo, &rule, expr);
        let outputs = rule.apply(&bindings[0], &ctx).unwrap();
        assert_eq!(outputs.len(), 1);

        match outputs[0].operator() {
            Operator::Physical(PhysicalOp::IndexScan(scan)) => {
                assert_eq!(scan.key_columns, vec!["a1".to_string()]);
                // 10 > a1 is normalized to a1 < 10
                assert_eq!(scan.key_operators, vec![BinaryOp::Lt]);
            }
            other => panic!("Unexpected operator: {}", other),
        }
    }

    fn join_with_predicate(memo: &mut Memo, predicate: ScalarExprRef) -> crate::memo::ExprId {
        let join = OperatorExpr::new(
            LogicalOp::InnerJoin(LogicalInnerJoin {
                predicates: vec![AnnotatedExpr::new(predicate)],
            }),
            vec![get("a", Some("A"), vec![]), get("b", Some("B"), vec![])],
        );
        memo.insert(&join).unwrap().0
    }

    #[test]
    fn test_hash_join_requires_equi_predicate() {
        let mut memo = Memo::new();
        let equi = join_with_predicate(
            &mut memo,
            ScalarExpr::binary(ScalarExpr::column("a", "a1"), BinaryOp::Eq, ScalarExpr::column("b", "b1")),
        );
        let non_equi = join_with_predicate(
            &mut memo,
            ScalarExpr::binary(ScalarExpr::column("a", "a1"), BinaryOp::Lt, ScalarExpr::column("b", "b1")),
        );

        let rule = InnerJoinToInnerHashJoinRule::new();
        let ctx = RuleContext::new(Rc::new(PropertySet::new()), &memo);

        let bindings = bind_pattern(&memo, equi, rule.pattern()).unwrap().collect::<Vec<_>>();
        assert!(rule.check(&bindings[0], &ctx), "equality between the two sides is hashable");

        let bindings = bind_pattern(&memo, non_equi, rule.pattern()).unwrap().collect::<Vec<_>>();
        assert!(!rule.check(&bindings[0], &ctx), "non-equi join is not hashable");
    }

    #[test]
    fn test_nl_join_always_applies() {
        let mut memo = Memo::new();
        let expr = join_with_predicate(
            &mut memo,
            ScalarExpr::binary(ScalarExpr::column("a", "a1"), BinaryOp::Lt, ScalarExpr::column("b", "b1")),
        );

        let rule = InnerJoinToInnerNLJoinRule::new();
        let ctx = RuleContext::new(Rc::new(PropertySet::new()), &memo);
        let bindings = bind_pattern(&memo, expr, rule.pattern()).unwrap().collect::<Vec<_>>();

        assert!(rule.check(&bindings[0], &ctx));
        let outputs = rule.apply(&bindings[0], &ctx).unwrap();
        assert!(matches!(outputs[0].operator(), Operator::Physical(PhysicalOp::NLJoin(_))));
        assert_eq!(outputs[0].children().len(), 2);
    }

    #[test]
    fn test_implement_limit() {
        let mut memo = Memo::new();
        let limit = OperatorExpr::new(
            LogicalOp::Limit(crate::operators::logical::LogicalLimit { offset: 5, limit: 10 }),
            vec![get("a", Some("A"), vec![])],
        );
        let (expr, _) = memo.insert(&limit).unwrap();

        let rule = ImplementLimitRule::new();
        let ctx = RuleContext::new(Rc::new(PropertySet::new()), &memo);
        let bindings = bind_pattern(&memo, expr, rule.pattern()).unwrap().collect::<Vec<_>>();
        let outputs = rule.apply(&bindings[0], &ctx).unwrap();

        match outputs[0].operator() {
            Operator::Physical(PhysicalOp::Limit(limit)) => {
                assert_eq!((limit.offset, limit.limit), (5, 10));
            }
            other => panic!("Unexpected operator: {}", other),
        }
    }
}
