//! Intermediate representation (IR) module.
//!
//! Contains the logical plan tree and helpers.

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use smol_str::format_smolstr;

use std::slice::Iter;

use expression::Expression;
use operator::Relational;
use relation::{Relations, Table};
use schema::{Column, ColumnIdGenerator};

use crate::errors::{Action, Entity, SiftError};
use crate::ir::relation::Type;

pub mod aggregates;
pub mod expression;
pub mod helpers;
pub mod operator;
pub mod relation;
pub mod schema;
pub mod transformation;
pub mod tree;
pub mod value;

/// Pointer to a node in the plan arena.
pub type NodeId = usize;

/// Plan tree node.
///
/// There are two kinds of node variants: expressions and relational
/// operators. Both of them can easily refer each other in the
/// tree as they are stored in the same node arena. The reasons
/// to separate them are:
///
/// - they should be treated with quite different logic
/// - we don't want to have a single huge enum
///
/// Enum was chosen as we don't want to mess with dynamic
/// dispatching and its performance penalties.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Node {
    Expression(Expression),
    Relational(Relational),
}

/// Plan nodes storage.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Nodes {
    /// We don't want to mess with the borrow checker and RefCell/Rc,
    /// so all nodes are stored in the single arena ("nodes" array).
    /// The positions in the array act like pointers, so it is possible
    /// only to add nodes to the plan, but never remove them.
    arena: Vec<Node>,
}

impl Nodes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn iter(&self) -> Iter<'_, Node> {
        self.arena.iter()
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    /// Add new node to arena.
    ///
    /// Inserts a new node to the arena and returns its position,
    /// that is treated as a pointer.
    pub fn push(&mut self, node: Node) -> NodeId {
        let position = self.arena.len();
        self.arena.push(node);
        position
    }

    /// Returns the next node position.
    #[must_use]
    pub fn next_id(&self) -> NodeId {
        self.arena.len()
    }

    pub fn reserve(&mut self, capacity: usize) {
        self.arena.reserve(capacity);
    }
}

/// Logical plan tree structure.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Plan {
    /// Append only arena for the plan nodes.
    pub(crate) nodes: Nodes,
    /// Relations are stored in a hash-map, with a table name acting as a
    /// key to guarantee its uniqueness across the plan.
    pub(crate) relations: Relations,
    /// The plan top is marked as optional for tree creation convenience.
    /// We build the plan tree in a bottom-up manner, so the top would
    /// be added last. The plan without a top should be treated as invalid.
    top: Option<NodeId>,
    /// Generator of the output column ids. Every transformation that has
    /// to materialize a new column (a repaired projection, a synthetic
    /// aggregate) allocates the id here, so fresh columns never collide
    /// with the existing ones.
    pub(crate) column_ids: ColumnIdGenerator,
}

impl Plan {
    /// Constructor for an empty plan structure.
    #[must_use]
    pub fn new() -> Self {
        Plan {
            nodes: Nodes { arena: Vec::new() },
            relations: Relations::new(),
            top: None,
            column_ids: ColumnIdGenerator::new(),
        }
    }

    /// Check if the plan arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.arena.is_empty()
    }

    /// Add relation to the plan.
    ///
    /// If relation already exists, do nothing.
    pub fn add_rel(&mut self, table: Table) {
        self.relations.insert(table);
    }

    /// Get relation in the plan by its name.
    #[must_use]
    pub fn get_relation(&self, name: &str) -> Option<&Table> {
        self.relations.get(name)
    }

    /// Check that plan tree is valid.
    ///
    /// # Errors
    /// - plan tree top is absent or points outside the arena
    pub fn check(&self) -> Result<(), SiftError> {
        match self.top {
            None => {
                return Err(SiftError::Invalid(
                    Entity::Plan,
                    Some("plan tree top is None".into()),
                ))
            }
            Some(top) => {
                if self.nodes.arena.get(top).is_none() {
                    return Err(SiftError::NotFound(
                        Entity::Node,
                        format_smolstr!("from arena with index {top}"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Get a node by its pointer (position in the node arena).
    ///
    /// # Errors
    /// - the node with the requested index doesn't exist
    pub fn get_node(&self, id: NodeId) -> Result<&Node, SiftError> {
        match self.nodes.arena.get(id) {
            None => Err(SiftError::NotFound(
                Entity::Node,
                format_smolstr!("from arena with index {id}"),
            )),
            Some(node) => Ok(node),
        }
    }

    /// Get a mutable node by its pointer (position in the node arena).
    ///
    /// # Errors
    /// - the node with the requested index doesn't exist
    pub fn get_mut_node(&mut self, id: NodeId) -> Result<&mut Node, SiftError> {
        match self.nodes.arena.get_mut(id) {
            None => Err(SiftError::NotFound(
                Entity::Node,
                format_smolstr!("(mutable) from arena with index {id}"),
            )),
            Some(node) => Ok(node),
        }
    }

    /// Get a top node of the plan tree.
    ///
    /// # Errors
    /// - top node is None (i.e. invalid plan)
    pub fn get_top(&self) -> Result<NodeId, SiftError> {
        self.top
            .ok_or_else(|| SiftError::Invalid(Entity::Plan, Some("plan tree top is None".into())))
    }

    /// Set top node of plan.
    ///
    /// # Errors
    /// - top node doesn't exist in the plan
    pub fn set_top(&mut self, top: NodeId) -> Result<(), SiftError> {
        self.get_node(top)?;
        self.top = Some(top);
        Ok(())
    }

    /// Get relation type node.
    ///
    /// # Errors
    /// - node doesn't exist in the plan
    /// - node is not a relational type
    pub fn get_relation_node(&self, node_id: NodeId) -> Result<&Relational, SiftError> {
        match self.get_node(node_id)? {
            Node::Relational(rel) => Ok(rel),
            Node::Expression(_) => Err(SiftError::Invalid(
                Entity::Node,
                Some("node is not Relational type".into()),
            )),
        }
    }

    /// Get mutable relation type node.
    ///
    /// # Errors
    /// - node doesn't exist in the plan
    /// - node is not a relational type
    pub fn get_mut_relation_node(&mut self, node_id: NodeId) -> Result<&mut Relational, SiftError> {
        match self.get_mut_node(node_id)? {
            Node::Relational(rel) => Ok(rel),
            Node::Expression(_) => Err(SiftError::Invalid(
                Entity::Node,
                Some("node is not Relational type".into()),
            )),
        }
    }

    /// Get expression type node.
    ///
    /// # Errors
    /// - node doesn't exist in the plan
    /// - node is not expression type
    pub fn get_expression_node(&self, node_id: NodeId) -> Result<&Expression, SiftError> {
        match self.get_node(node_id)? {
            Node::Expression(exp) => Ok(exp),
            Node::Relational(_) => Err(SiftError::Invalid(
                Entity::Node,
                Some("node is not Expression type".into()),
            )),
        }
    }

    /// Get mutable expression type node.
    ///
    /// # Errors
    /// - node doesn't exist in the plan
    /// - node is not expression type
    pub fn get_mut_expression_node(&mut self, node_id: NodeId) -> Result<&mut Expression, SiftError> {
        match self.get_mut_node(node_id)? {
            Node::Expression(exp) => Ok(exp),
            Node::Relational(_) => Err(SiftError::Invalid(
                Entity::Node,
                Some("node is not expression type".into()),
            )),
        }
    }

    /// Allocate a fresh output column of the given type.
    pub fn new_column(&mut self, r#type: Type) -> Column {
        Column {
            id: self.column_ids.next_id(),
            r#type,
        }
    }

    #[must_use]
    pub fn next_id(&self) -> NodeId {
        self.nodes.next_id()
    }

    /// Construct a plan from the YAML string.
    ///
    /// # Errors
    /// - the YAML plan is invalid
    pub fn from_yaml(s: &str) -> Result<Self, SiftError> {
        let plan: Plan = match serde_yaml::from_str(s) {
            Ok(p) => p,
            Err(e) => {
                return Err(SiftError::FailedTo(
                    Action::Deserialize,
                    Some(Entity::Plan),
                    format_smolstr!("{e:?}"),
                ))
            }
        };
        plan.check()?;
        Ok(plan)
    }

    /// Helper function for writing tests with yaml.
    ///
    /// # Errors
    /// - serde failed to serialize the plan
    pub fn to_yaml(&self) -> Result<String, SiftError> {
        match serde_yaml::to_string(self) {
            Ok(s) => Ok(s),
            Err(e) => Err(SiftError::FailedTo(
                Action::Serialize,
                Some(Entity::Plan),
                format_smolstr!("{e:?}"),
            )),
        }
    }

    /// Fingerprint of the plan tree shape.
    ///
    /// # Errors
    /// - serialization error (to binary)
    pub fn pattern_id(&self) -> Result<String, SiftError> {
        let bytes: Vec<u8> = bincode::serialize(&self.nodes).map_err(|e| {
            SiftError::FailedTo(
                Action::Serialize,
                None,
                format_smolstr!("plan nodes to binary: {e:?}"),
            )
        })?;
        let hash = Base64::encode_string(blake3::hash(&bytes).to_hex().as_bytes());
        Ok(hash)
    }
}

#[cfg(test)]
mod tests;
