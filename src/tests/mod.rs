//! End-to-end optimizer tests.

use crate::cost::{Cost, INDEX_TUPLE_COST, OPERATOR_COST, TUPLE_COST};
use crate::error::OptimizerError;
use crate::memo::Memo;
use crate::operators::physical::PhysicalOp;
use crate::operators::scalar::BinaryOp;
use crate::optimizer::PhysicalPlan;
use crate::properties::{Property, PropertySet};
use crate::testing::{
    cmp, col, delete, distinct, filter, group_by, inner_join, int, limit, require_ordering, table_get, OptimizerTester,
};

fn close_to(actual: Cost, expected: Cost) -> bool {
    (actual - expected).abs() < 1e-6
}

#[test]
fn test_predicate_is_embedded_into_the_scan() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);

    let query = filter(vec![cmp(col("a", "a1"), BinaryOp::Gt, int(5))], table_get("A", "a"));

    let plan = tester.expect_plan(
        &query,
        r#"
SeqScan a preds=[a.a1 > 5]
"#,
    );
    assert!(close_to(plan.cost(), 100.0 * TUPLE_COST));
}

#[test]
fn test_filter_is_pushed_through_a_join() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_row_count("B", 100.0);

    let query = filter(
        vec![
            cmp(col("a", "a2"), BinaryOp::Gt, int(5)),
            cmp(col("a", "a1"), BinaryOp::Eq, col("b", "b1")),
        ],
        inner_join(vec![], table_get("A", "a"), table_get("B", "b")),
    );

    let plan = tester.expect_plan(
        &query,
        r#"
HashJoin preds=[a.a1 = b.b1]
  SeqScan a preds=[a.a2 > 5]
  SeqScan b
"#,
    );
    // two scans plus the hash join over both inputs
    assert!(close_to(plan.cost(), (100.0 + 100.0) * TUPLE_COST + 2.0 * 100.0 * TUPLE_COST));
}

#[test]
fn test_hash_join_is_chosen_for_an_equi_join() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_row_count("B", 200.0);

    let query = inner_join(
        vec![cmp(col("a", "a1"), BinaryOp::Eq, col("b", "b1"))],
        table_get("A", "a"),
        table_get("B", "b"),
    );

    tester.expect_plan(
        &query,
        r#"
HashJoin preds=[a.a1 = b.b1]
  SeqScan a
  SeqScan b
"#,
    );
}

#[test]
fn test_nl_join_is_chosen_for_a_non_equi_join() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_row_count("B", 100.0);

    let query = inner_join(
        vec![cmp(col("a", "a1"), BinaryOp::Lt, col("b", "b1"))],
        table_get("A", "a"),
        table_get("B", "b"),
    );

    tester.expect_plan(
        &query,
        r#"
NLJoin preds=[a.a1 < b.b1]
  SeqScan a
  SeqScan b
"#,
    );
}

#[test]
fn test_index_scan_satisfies_the_required_ordering() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 1000.0);
    tester.add_index("A", "A_a1_idx", &["a1"], false);
    tester.require(require_ordering(vec![col("a", "a1")]));

    let plan = tester.expect_plan(
        &table_get("A", "a"),
        r#"
IndexScan a index=A_a1_idx { ordering: [+a.a1] }
"#,
    );
    assert!(matches!(plan.operator(), PhysicalOp::IndexScan(_)));
    assert!(close_to(plan.cost(), 1000f64.log2() * INDEX_TUPLE_COST + 1000.0 * TUPLE_COST));
}

#[test]
fn test_sort_collapses_over_the_primary_index() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 1000.0);
    tester.set_primary_column("A", "a1", 1000.0);
    tester.add_index("A", "A_a1_idx", &["a1"], true);
    tester.require(require_ordering(vec![col("a", "a1")]));

    // Rows are already clustered by a1: a sequential scan plus a free sort beats
    // the index scan.
    let plan = tester.expect_plan(
        &table_get("A", "a"),
        r#"
Sort [+a.a1] { ordering: [+a.a1] }
  SeqScan a
"#,
    );
    assert!(close_to(plan.cost(), 1000.0 * TUPLE_COST + OPERATOR_COST));
}

#[test]
fn test_ordering_is_enforced_above_a_join() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_row_count("B", 100.0);
    tester.require(require_ordering(vec![col("a", "a1")]));

    let query = inner_join(
        vec![cmp(col("a", "a1"), BinaryOp::Eq, col("b", "b1"))],
        table_get("A", "a"),
        table_get("B", "b"),
    );

    let plan = tester.expect_plan(
        &query,
        r#"
Sort [+a.a1] { ordering: [+a.a1] }
  HashJoin preds=[a.a1 = b.b1]
    SeqScan a
    SeqScan b
"#,
    );
    assert!(plan.cost() > plan.inputs()[0].cost(), "the enforcer adds cost");
}

#[test]
fn test_limit_plan() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);

    let query = limit(0, 10, table_get("A", "a"));

    let plan = tester.expect_plan(
        &query,
        r#"
Limit offset=0 limit=10
  SeqScan a
"#,
    );
    assert!(close_to(plan.cost(), 10.0 * TUPLE_COST + 100.0 * TUPLE_COST));
}

#[test]
fn test_group_by_provides_the_required_distinct_property() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_cardinality("A", "a1", 10.0);
    tester.require(PropertySet::with_property(Property::Distinct(vec![col("a", "a1")])));

    let query = group_by(vec![col("a", "a1")], table_get("A", "a"));

    tester.expect_plan(
        &query,
        r#"
HashGroupBy cols=[a.a1] { distinct: [a.a1] }
  SeqScan a
"#,
    );
}

#[test]
fn test_distinct_plan() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_cardinality("A", "a1", 10.0);

    let query = distinct(vec![col("a", "a1")], table_get("A", "a"));

    tester.expect_plan(
        &query,
        r#"
Distinct cols=[a.a1]
  SeqScan a
"#,
    );
}

#[test]
fn test_delete_plan() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);

    let query = delete("A", table_get("A", "a"));

    tester.expect_plan(
        &query,
        r#"
Delete A
  SeqScan a
"#,
    );
}

#[test]
fn test_unenforceable_requirement_yields_no_plan() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.require(PropertySet::with_property(Property::Distinct(vec![col("a", "a1")])));

    let err = tester.optimize(&table_get("A", "a")).expect_err("a scan can not produce distinct rows");
    assert!(matches!(err, OptimizerError::NoPlanFound(_)), "unexpected error: {}", err);
}

fn count_operators(plan: &PhysicalPlan, matches: &dyn Fn(&PhysicalOp) -> bool) -> usize {
    let mut count = usize::from(matches(plan.operator()));
    for input in plan.inputs() {
        count += count_operators(input, matches);
    }
    count
}

fn assert_costs_are_additive(plan: &PhysicalPlan) {
    let input_cost: Cost = plan.inputs().iter().map(|input| input.cost()).sum();
    assert!(
        plan.cost() >= input_cost - 1e-9,
        "cost of {} is below the cost of its inputs: {} < {}",
        plan.operator(),
        plan.cost(),
        input_cost
    );
    for input in plan.inputs() {
        assert_costs_are_additive(input);
    }
}

#[test]
fn test_three_way_join() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_row_count("B", 100.0);
    tester.set_row_count("C", 100.0);

    let query = inner_join(
        vec![cmp(col("b", "b2"), BinaryOp::Eq, col("c", "c1"))],
        inner_join(
            vec![cmp(col("a", "a1"), BinaryOp::Eq, col("b", "b1"))],
            table_get("A", "a"),
            table_get("B", "b"),
        ),
        table_get("C", "c"),
    );

    let plan = tester.optimize(&query).expect("failed to optimize a three-way join");

    assert_eq!(count_operators(&plan, &|op| matches!(op, PhysicalOp::HashJoin(_))), 2);
    assert_eq!(count_operators(&plan, &|op| matches!(op, PhysicalOp::SeqScan(_))), 3);
    assert_costs_are_additive(&plan);
}

#[test]
fn test_reoptimizing_a_memoized_plan_adds_no_expressions() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_row_count("B", 100.0);
    tester.set_row_count("C", 100.0);

    let query = inner_join(
        vec![cmp(col("b", "b2"), BinaryOp::Eq, col("c", "c1"))],
        inner_join(
            vec![cmp(col("a", "a1"), BinaryOp::Eq, col("b", "b1"))],
            table_get("A", "a"),
            table_get("B", "b"),
        ),
        table_get("C", "c"),
    );

    let mut memo = Memo::new();
    let plan1 = tester.optimize_with_memo(&query, &mut memo).expect("first run");
    let num_groups = memo.num_groups();
    let num_exprs = memo.num_exprs();

    let plan2 = tester.optimize_with_memo(&query, &mut memo).expect("second run");

    assert_eq!(memo.num_groups(), num_groups, "no new groups on the second run");
    assert_eq!(memo.num_exprs(), num_exprs, "no new expressions on the second run");
    assert_eq!(format!("{}", plan1), format!("{}", plan2));
}

#[test]
fn test_chosen_plan_does_not_depend_on_rule_enumeration_order() {
    let mut tester = OptimizerTester::new();
    tester.set_row_count("A", 100.0);
    tester.set_row_count("B", 100.0);
    tester.shuffle_rules(true);

    let query = filter(
        vec![
            cmp(col("a", "a2"), BinaryOp::Gt, int(5)),
            cmp(col("a", "a1"), BinaryOp::Eq, col("b", "b1")),
        ],
        inner_join(vec![], table_get("A", "a"), table_get("B", "b")),
    );

    let expected = format!("{}", tester.optimize(&query).expect("optimize"));
    for _ in 0..5 {
        let plan = tester.optimize(&query).expect("optimize with shuffled rules");
        assert_eq!(format!("{}", plan), expected);
    }
}
