use pretty_assertions::assert_eq;

use crate::errors::SiftError;
use crate::ir::relation::{ColumnDef, Table, TableKind, Type};
use crate::ir::value::Value;
use crate::ir::Plan;

fn small_plan() -> Plan {
    let mut plan = Plan::new();
    plan.add_rel(Table::new(
        "t",
        vec![
            ColumnDef::new("a", Type::Integer),
            ColumnDef::new("b", Type::String),
        ],
        TableKind::Storage,
    ));
    let scan = plan.add_scan("t").unwrap();
    let cols = plan.output_schema(scan).unwrap().columns().to_vec();
    let ref_a = plan.nodes.add_column_ref(cols[0]);
    let proj = plan.add_proj(scan, vec![ref_a]).unwrap();
    plan.set_top(proj).unwrap();
    plan
}

#[test]
fn empty_plan_has_no_top() {
    let plan = Plan::new();
    assert!(plan.is_empty());
    let err = plan.get_top().unwrap_err();
    assert!(matches!(err, SiftError::Invalid(..)));
    assert!(plan.check().is_err());
}

#[test]
fn set_top_validates_the_node() {
    let mut plan = Plan::new();
    let err = plan.set_top(42).unwrap_err();
    assert!(matches!(err, SiftError::NotFound(..)));

    let constant = plan.nodes.add_const(Value::Unsigned(1));
    plan.set_top(constant).unwrap();
    assert_eq!(constant, plan.get_top().unwrap());
    plan.check().unwrap();
}

#[test]
fn node_kind_accessors_complain_about_the_wrong_kind() {
    let mut plan = small_plan();
    let top = plan.get_top().unwrap();
    assert!(plan.get_relation_node(top).is_ok());
    assert!(plan.get_expression_node(top).is_err());
    assert!(plan.get_mut_relation_node(top).is_ok());

    let constant = plan.nodes.add_const(Value::Null);
    assert!(plan.get_expression_node(constant).is_ok());
    assert!(plan.get_relation_node(constant).is_err());
}

#[test]
fn yaml_round_trip() {
    let plan = small_plan();
    let yaml = plan.to_yaml().unwrap();
    let back = Plan::from_yaml(&yaml).unwrap();
    assert_eq!(plan, back);
}

#[test]
fn from_yaml_rejects_garbage() {
    let err = Plan::from_yaml("definitely: not a plan").unwrap_err();
    assert!(matches!(err, SiftError::FailedTo(..)));
}

#[test]
fn pattern_id_tracks_the_tree_shape() {
    let plan = small_plan();
    let other = small_plan();
    // The same construction produces the same fingerprint.
    assert_eq!(plan.pattern_id().unwrap(), other.pattern_id().unwrap());

    let mut changed = small_plan();
    changed.nodes.add_const(Value::Unsigned(7));
    assert_ne!(plan.pattern_id().unwrap(), changed.pattern_id().unwrap());
}

#[test]
fn fresh_columns_never_collide() {
    let mut plan = small_plan();
    let existing: Vec<u64> = {
        let scan_cols = plan.output_schema(plan.get_top().unwrap()).unwrap();
        scan_cols.columns().iter().map(|c| c.id).collect()
    };
    let fresh = plan.new_column(Type::Integer);
    assert!(!existing.contains(&fresh.id));
}
