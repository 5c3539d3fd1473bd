use std::fmt;

use serde::Serialize;
use smol_str::SmolStr;

/// Kinds of the objects the planner can complain about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Entity {
    /// Aggregate function descriptor.
    Aggregate,
    /// Schema column.
    Column,
    /// Expression node.
    Expression,
    /// Handle columns of a data source.
    Handle,
    /// Node of the plan arena (relational or expression).
    Node,
    /// Logical plan tree.
    Plan,
    /// Relational operator node.
    Relational,
    /// Output schema of a relational node.
    Schema,
    /// Table from the plan catalog.
    Table,
    /// Column or expression type.
    Type,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = match self {
            Entity::Aggregate => "aggregate",
            Entity::Column => "column",
            Entity::Expression => "expression",
            Entity::Handle => "handle",
            Entity::Node => "node",
            Entity::Plan => "plan",
            Entity::Relational => "relational node",
            Entity::Schema => "schema",
            Entity::Table => "table",
            Entity::Type => "type",
        };
        write!(f, "{p}")
    }
}

/// Action that failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Action {
    Build,
    Create,
    Deserialize,
    Get,
    Prune,
    Serialize,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = match self {
            Action::Build => "build",
            Action::Create => "create",
            Action::Deserialize => "deserialize",
            Action::Get => "get",
            Action::Prune => "prune",
            Action::Serialize => "serialize",
        };
        write!(f, "{p}")
    }
}

/// Planner error definitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SiftError {
    /// Failed to perform an action on some entity.
    FailedTo(Action, Option<Entity>, SmolStr),
    /// Entity is in an invalid state.
    Invalid(Entity, Option<SmolStr>),
    /// Entity is missing.
    NotFound(Entity, SmolStr),
    /// A list of objects has an unexpected length.
    UnexpectedNumberOfValues(SmolStr),
    /// Entity is not supported by the planner.
    Unsupported(Entity, Option<SmolStr>),
}

impl fmt::Display for SiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiftError::FailedTo(action, entity, details) => match entity {
                Some(entity) => write!(f, "failed to {action} {entity}: {details}"),
                None => write!(f, "failed to {action} {details}"),
            },
            SiftError::Invalid(entity, details) => match details {
                Some(details) => write!(f, "invalid {entity}: {details}"),
                None => write!(f, "invalid {entity}"),
            },
            SiftError::NotFound(entity, details) => write!(f, "{entity} not found: {details}"),
            SiftError::UnexpectedNumberOfValues(details) => {
                write!(f, "unexpected number of values: {details}")
            }
            SiftError::Unsupported(entity, details) => match details {
                Some(details) => write!(f, "unsupported {entity}: {details}"),
                None => write!(f, "unsupported {entity}"),
            },
        }
    }
}

impl std::error::Error for SiftError {}
