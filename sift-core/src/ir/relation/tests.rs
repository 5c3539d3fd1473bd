use pretty_assertions::assert_eq;

use crate::ir::relation::{ColumnDef, ColumnRole, Relations, Table, TableKind, Type};

#[test]
fn row_id_column_is_hidden_unsigned() {
    let def = ColumnDef::row_id();
    assert_eq!("_row_id", def.name);
    assert_eq!(Type::Unsigned, def.r#type);
    assert_eq!(ColumnRole::RowId, def.role);
}

#[test]
fn relations_are_keyed_by_name() {
    let mut relations = Relations::new();
    relations.insert(Table::new(
        "t",
        vec![ColumnDef::new("a", Type::Integer)],
        TableKind::Storage,
    ));
    relations.insert(Table::new("stats", vec![], TableKind::Cluster));

    assert!(relations.get("t").is_some());
    assert!(relations.get("missing").is_none());
    assert!(relations.get("stats").unwrap().is_cluster());
    assert!(!relations.get("t").unwrap().is_cluster());
}

#[test]
fn table_serialization_round_trip() {
    let table = Table::new(
        "t",
        vec![
            ColumnDef::new("a", Type::Integer),
            ColumnDef::row_id(),
        ],
        TableKind::Storage,
    );
    let yaml = serde_yaml::to_string(&table).unwrap();
    let back: Table = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(table, back);
}
