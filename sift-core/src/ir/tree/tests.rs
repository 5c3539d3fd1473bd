use pretty_assertions::assert_eq;
use traversal::DftPost;

use crate::ir::relation::{ColumnDef, Table, TableKind, Type};
use crate::ir::value::Value;
use crate::ir::Plan;

#[test]
fn expr_iter_walks_function_arguments() {
    let mut plan = Plan::new();
    let one = plan.nodes.add_const(Value::Unsigned(1));
    let two = plan.nodes.add_const(Value::Unsigned(2));
    let add = plan
        .nodes
        .add_scalar_function("add", vec![one, two], Type::Integer);
    let neg = plan.nodes.add_scalar_function("neg", vec![add], Type::Integer);

    let post_order: Vec<usize> = DftPost::new(&neg, |node| plan.nodes.expr_iter(node))
        .map(|(_, id)| *id)
        .collect();
    assert_eq!(vec![one, two, add, neg], post_order);
}

#[test]
fn leaves_have_no_children() {
    let mut plan = Plan::new();
    let constant = plan.nodes.add_const(Value::Null);
    assert_eq!(0, plan.nodes.expr_iter(&constant).count());
    assert_eq!(0, plan.nodes.rel_iter(&constant).count());
}

#[test]
fn rel_iter_walks_relational_children_only() {
    let mut plan = Plan::new();
    plan.add_rel(Table::new(
        "t",
        vec![ColumnDef::new("a", Type::Integer)],
        TableKind::Storage,
    ));
    let scan = plan.add_scan("t").unwrap();
    let cols = plan.output_schema(scan).unwrap().columns().to_vec();
    let ref_a = plan.nodes.add_column_ref(cols[0]);
    let proj = plan.add_proj(scan, vec![ref_a]).unwrap();

    let children: Vec<usize> = plan.nodes.rel_iter(&proj).copied().collect();
    assert_eq!(vec![scan], children);

    let post_order: Vec<usize> = DftPost::new(&proj, |node| plan.nodes.rel_iter(node))
        .map(|(_, id)| *id)
        .collect();
    assert_eq!(vec![scan, proj], post_order);
}
