//! Output schema module.
//!
//! Every relational operator produces an ordered tuple of columns.
//! Unlike the catalog columns from the relation module, these columns
//! are identified by a plan-wide unique id: two operators never share
//! a column unless one of them passes the other's output through.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::ir::relation::Type;

/// Plan-wide unique column identifier.
pub type ColumnId = u64;

/// Column of an operator output.
///
/// Equality (and hashing) is defined by the unique id alone: the type
/// is a payload that travels with the column, not a part of its identity.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Column {
    /// Unique id allocated by the plan column-id generator.
    pub id: ColumnId,
    /// Column type.
    pub r#type: Type,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Ordered sequence of the output columns.
///
/// The order is observable by the consumers of the operator and must be
/// preserved by all the plan transformations except the explicit
/// positional removals they perform.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl From<Vec<Column>> for Schema {
    fn from(columns: Vec<Column>) -> Self {
        Schema { columns }
    }
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Schema { columns: vec![] }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn contains(&self, col: &Column) -> bool {
        self.columns.contains(col)
    }

    /// Position of the column in the schema.
    #[must_use]
    pub fn index_of(&self, col: &Column) -> Option<usize> {
        self.columns.iter().position(|c| c == col)
    }

    pub fn append(&mut self, col: Column) {
        self.columns.push(col);
    }

    /// Remove the column at the given position.
    ///
    /// # Panics
    /// - position is out of bounds (a broken position-parallel invariant
    ///   upstream, never a user input)
    pub fn remove(&mut self, position: usize) -> Column {
        self.columns.remove(position)
    }

    /// Positional membership of the schema columns in the required set.
    #[must_use]
    pub fn used_list(&self, required: &[Column]) -> Vec<bool> {
        self.columns.iter().map(|c| required.contains(c)).collect()
    }
}

/// Monotonic generator of the plan column ids.
///
/// The only piece of state shared between the plan transformations:
/// fresh ids must never collide with the ids already in the plan.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnIdGenerator {
    next: ColumnId,
}

impl ColumnIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        ColumnIdGenerator { next: 0 }
    }

    pub fn next_id(&mut self) -> ColumnId {
        let id = self.next;
        self.next += 1;
        id
    }
}
