//! Relation module.
//!
//! Contains following structs:
//! * Column type (`Type`)
//! * Catalog column (`ColumnDef`) and its role (`ColumnRole`)
//! * Table, representing a named tuple storage (`Table`)
//! * Relations, a map of { name -> table } used by the plan

use std::collections::HashMap;
use std::fmt::{self, Formatter};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Supported column types.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Boolean,
    Decimal,
    Double,
    Integer,
    /// Type of the NULL literal. A column can carry it only
    /// when the planner failed to derive anything better.
    Null,
    #[default]
    Scalar,
    String,
    Unsigned,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "boolean"),
            Type::Decimal => write!(f, "decimal"),
            Type::Double => write!(f, "double"),
            Type::Integer => write!(f, "integer"),
            Type::Null => write!(f, "null"),
            Type::Scalar => write!(f, "scalar"),
            Type::String => write!(f, "string"),
            Type::Unsigned => write!(f, "unsigned"),
        }
    }
}

/// Role of the catalog column.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    /// Regular column with data provided by the user.
    #[default]
    User,
    /// Row identifier of the storage layer, hidden from the user.
    RowId,
}

/// Catalog (table) column.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: SmolStr,
    /// Column type.
    pub r#type: Type,
    /// Column role.
    pub role: ColumnRole,
}

/// Name of the hidden row-id column a scan falls back to when
/// everything else has been pruned from its output.
pub const ROW_ID_COLUMN: &str = "_row_id";

impl ColumnDef {
    #[must_use]
    pub fn new(name: &str, r#type: Type) -> Self {
        ColumnDef {
            name: SmolStr::from(name),
            r#type,
            role: ColumnRole::User,
        }
    }

    /// Hidden row-id column of the storage layer.
    #[must_use]
    pub fn row_id() -> Self {
        ColumnDef {
            name: SmolStr::from(ROW_ID_COLUMN),
            r#type: Type::Unsigned,
            role: ColumnRole::RowId,
        }
    }
}

/// Kind of the table behind a scan node.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Regular sharded table served by the storage layer.
    Storage,
    /// Cluster-wide table assembled from every storage node.
    Cluster,
    /// In-memory system table served by the instance itself.
    System,
}

/// Named tuple storage.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Table {
    /// Table name.
    pub name: SmolStr,
    /// Catalog columns in the storage order.
    pub columns: Vec<ColumnDef>,
    /// Kind of the table.
    pub kind: TableKind,
}

impl Table {
    #[must_use]
    pub fn new(name: &str, columns: Vec<ColumnDef>, kind: TableKind) -> Self {
        Table {
            name: SmolStr::from(name),
            columns,
            kind,
        }
    }

    #[must_use]
    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, TableKind::Cluster)
    }
}

/// Map of the plan tables.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Relations {
    tables: HashMap<SmolStr, Table>,
}

impl Relations {
    #[must_use]
    pub fn new() -> Self {
        Relations {
            tables: HashMap::new(),
        }
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}

#[cfg(test)]
mod tests;
