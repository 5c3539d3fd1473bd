use pretty_assertions::assert_eq;

use crate::ir::expression::{Comparator, FUNC_SET_VAR, FUNC_SLEEP};
use crate::ir::relation::Type;
use crate::ir::schema::Column;
use crate::ir::value::Value;
use crate::ir::Plan;

fn column(plan: &mut Plan, r#type: Type) -> Column {
    plan.new_column(r#type)
}

#[test]
fn extract_columns_returns_the_multiset() {
    let mut plan = Plan::new();
    let a = column(&mut plan, Type::Integer);
    let b = column(&mut plan, Type::Integer);
    let ref_a1 = plan.nodes.add_column_ref(a);
    let ref_b = plan.nodes.add_column_ref(b);
    let ref_a2 = plan.nodes.add_column_ref(a);
    let add = plan
        .nodes
        .add_scalar_function("add", vec![ref_a1, ref_b], Type::Integer);
    let mul = plan
        .nodes
        .add_scalar_function("mul", vec![add, ref_a2], Type::Integer);

    let columns = plan.extract_columns(mul).unwrap();
    assert_eq!(vec![a, b, a], columns);
}

#[test]
fn correlated_columns_are_not_extracted() {
    let mut plan = Plan::new();
    let a = column(&mut plan, Type::Integer);
    let b = column(&mut plan, Type::Integer);
    let cor_a = plan.nodes.add_cor_column_ref(a);
    let ref_b = plan.nodes.add_column_ref(b);
    let eq = plan
        .nodes
        .add_scalar_function("eq", vec![ref_b, cor_a], Type::Boolean);

    let columns = plan.extract_columns(eq).unwrap();
    assert_eq!(vec![b], columns);
}

#[test]
fn nested_sleep_is_a_side_effect() {
    let mut plan = Plan::new();
    let one = plan.nodes.add_const(Value::Unsigned(1));
    let sleep = plan
        .nodes
        .add_scalar_function(FUNC_SLEEP, vec![one], Type::Integer);
    let outer = plan
        .nodes
        .add_scalar_function("add", vec![sleep], Type::Integer);

    assert!(plan.expr_has_side_effects(outer).unwrap());
    assert!(!plan.expr_has_side_effects(one).unwrap());
}

#[test]
fn set_var_is_a_side_effect() {
    let mut plan = Plan::new();
    let one = plan.nodes.add_const(Value::Unsigned(1));
    let set_var = plan
        .nodes
        .add_scalar_function(FUNC_SET_VAR, vec![one], Type::Integer);

    assert!(plan.expr_has_side_effects(set_var).unwrap());
    assert!(plan.exprs_have_side_effects(&[one, set_var]).unwrap());
    assert!(!plan.exprs_have_side_effects(&[one]).unwrap());
}

#[test]
fn runtime_constants() {
    let mut plan = Plan::new();
    let a = column(&mut plan, Type::Integer);
    let constant = plan.nodes.add_const(Value::Unsigned(42));
    let correlated = plan.nodes.add_cor_column_ref(a);
    let col_ref = plan.nodes.add_column_ref(a);
    let closed = plan
        .nodes
        .add_scalar_function("add", vec![constant, correlated], Type::Integer);
    let open = plan
        .nodes
        .add_scalar_function("add", vec![constant, col_ref], Type::Integer);
    let rand = plan.nodes.add_scalar_function("rand", vec![], Type::Double);

    assert!(plan.is_runtime_const_expr(constant).unwrap());
    assert!(plan.is_runtime_const_expr(correlated).unwrap());
    assert!(plan.is_runtime_const_expr(closed).unwrap());
    assert!(!plan.is_runtime_const_expr(col_ref).unwrap());
    assert!(!plan.is_runtime_const_expr(open).unwrap());
    assert!(!plan.is_runtime_const_expr(rand).unwrap());
}

#[test]
fn expression_types() {
    let mut plan = Plan::new();
    let a = column(&mut plan, Type::String);
    let col_ref = plan.nodes.add_column_ref(a);
    let null = plan.nodes.add_const(Value::Null);
    let func = plan
        .nodes
        .add_scalar_function("length", vec![col_ref], Type::Unsigned);

    assert_eq!(Type::String, plan.calculate_expr_type(col_ref).unwrap());
    assert_eq!(Type::Null, plan.calculate_expr_type(null).unwrap());
    assert_eq!(Type::Unsigned, plan.calculate_expr_type(func).unwrap());
}

#[test]
fn const_one_is_an_unsigned_literal() {
    let mut plan = Plan::new();
    let one = plan.add_const_one();
    assert_eq!(Type::Unsigned, plan.calculate_expr_type(one).unwrap());
    assert!(plan.is_runtime_const_expr(one).unwrap());
}

#[test]
fn equal_structures_hash_equally() {
    let mut plan = Plan::new();
    let a = column(&mut plan, Type::Integer);
    let lhs = {
        let r = plan.nodes.add_column_ref(a);
        let c = plan.nodes.add_const(Value::Unsigned(2));
        plan.nodes.add_scalar_function("add", vec![r, c], Type::Integer)
    };
    let rhs = {
        let r = plan.nodes.add_column_ref(a);
        let c = plan.nodes.add_const(Value::Unsigned(2));
        plan.nodes.add_scalar_function("add", vec![r, c], Type::Integer)
    };
    let comparator = Comparator::new(&plan);
    assert_eq!(comparator.expr_hash(lhs), comparator.expr_hash(rhs));
}

#[test]
fn hash_is_type_aware() {
    let mut plan = Plan::new();
    let a = column(&mut plan, Type::Integer);
    let r1 = plan.nodes.add_column_ref(a);
    let as_int = plan
        .nodes
        .add_scalar_function("abs", vec![r1], Type::Integer);
    let r2 = plan.nodes.add_column_ref(a);
    let as_string = plan
        .nodes
        .add_scalar_function("abs", vec![r2], Type::String);
    let comparator = Comparator::new(&plan);
    assert_ne!(comparator.expr_hash(as_int), comparator.expr_hash(as_string));
}

#[test]
fn correlated_and_plain_references_hash_differently() {
    let mut plan = Plan::new();
    let a = column(&mut plan, Type::Integer);
    let plain = plan.nodes.add_column_ref(a);
    let correlated = plan.nodes.add_cor_column_ref(a);
    let comparator = Comparator::new(&plan);
    assert_ne!(comparator.expr_hash(plain), comparator.expr_hash(correlated));
}
