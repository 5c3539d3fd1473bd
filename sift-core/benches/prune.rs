extern crate sift_core;

use criterion::{criterion_group, criterion_main, Criterion};

use sift_core::ir::aggregates::AggregateKind;
use sift_core::ir::operator::{JoinKind, OrderByElement, OrderByType};
use sift_core::ir::relation::{ColumnDef, Table, TableKind, Type};
use sift_core::ir::{NodeId, Plan};

fn wide_table(name: &str, width: usize) -> Table {
    Table::new(
        name,
        (0..width)
            .map(|i| ColumnDef::new(&format!("c{i}"), Type::Integer))
            .collect(),
        TableKind::Storage,
    )
}

fn chain_over_scan(plan: &mut Plan, scan: NodeId) -> NodeId {
    let cols = plan.output_schema(scan).unwrap().columns().to_vec();
    let refs: Vec<NodeId> = cols
        .iter()
        .map(|col| plan.add_column_ref(*col))
        .collect();
    let proj = plan.add_proj(scan, refs).unwrap();
    let proj_cols = plan.output_schema(proj).unwrap().columns().to_vec();
    let key = plan.add_column_ref(proj_cols[0]);
    let sort = plan
        .add_order_by(
            proj,
            vec![OrderByElement {
                expr: key,
                order: OrderByType::Asc,
            }],
        )
        .unwrap();
    plan.add_limit(sort, 100, 0).unwrap()
}

fn build_plan() -> Plan {
    let mut plan = Plan::new();
    plan.add_rel(wide_table("left", 32));
    plan.add_rel(wide_table("right", 32));
    let left_scan = plan.add_scan("left").unwrap();
    let right_scan = plan.add_scan("right").unwrap();
    let left = chain_over_scan(&mut plan, left_scan);
    let right = chain_over_scan(&mut plan, right_scan);

    let left_cols = plan.output_schema(left).unwrap().columns().to_vec();
    let right_cols = plan.output_schema(right).unwrap().columns().to_vec();
    let lhs = plan.add_column_ref(left_cols[0]);
    let rhs = plan.add_column_ref(right_cols[0]);
    let eq = plan.add_scalar_function("eq", vec![lhs, rhs], Type::Boolean);
    let join = plan
        .add_join(left, right, JoinKind::Inner, vec![eq], vec![], vec![], vec![])
        .unwrap();

    let join_cols = plan.output_schema(join).unwrap().columns().to_vec();
    let arg = plan.add_column_ref(join_cols[0]);
    let sum = plan
        .new_aggregate_function(AggregateKind::SUM, vec![arg])
        .unwrap();
    let group_key = plan.add_column_ref(join_cols[1]);
    let agg = plan.add_group_by(join, vec![sum], vec![group_key]).unwrap();
    plan.set_top(agg).unwrap();
    plan
}

fn bench_column_pruning(c: &mut Criterion) {
    let plan = build_plan();
    c.bench_function("column_prune", |b| {
        b.iter(|| {
            let mut cloned = plan.clone();
            cloned.prune_columns().unwrap();
            cloned
        });
    });
}

criterion_group!(benches, bench_column_pruning);
criterion_main!(benches);
