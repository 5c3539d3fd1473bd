//! Relational node's child iterator.

use std::slice::Iter;

use super::EMPTY_CHILDREN;
use crate::ir::{Node, NodeId, Nodes};

impl Nodes {
    /// Iterator over the relational children of a relational node.
    ///
    /// Expression nodes and invalid ids produce an empty iterator.
    #[must_use]
    pub fn rel_iter<'n>(&'n self, current: &NodeId) -> Iter<'n, NodeId> {
        match self.get(*current) {
            Some(Node::Relational(rel)) => rel.children().iter(),
            _ => EMPTY_CHILDREN.iter(),
        }
    }
}
