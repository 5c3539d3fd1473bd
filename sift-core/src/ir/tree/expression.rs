//! Expression node's child iterator.

use std::slice::Iter;

use super::EMPTY_CHILDREN;
use crate::ir::expression::Expression;
use crate::ir::{Node, NodeId, Nodes};

impl Nodes {
    /// Iterator over the direct children of an expression node.
    ///
    /// Returns an empty iterator for the leaf expressions and for the
    /// ids that don't point to an expression at all, so the traversal
    /// helpers can be built on top of it without extra error plumbing.
    #[must_use]
    pub fn expr_iter<'n>(&'n self, current: &NodeId) -> Iter<'n, NodeId> {
        match self.get(*current) {
            Some(Node::Expression(Expression::ScalarFunction { children, .. })) => children.iter(),
            _ => EMPTY_CHILDREN.iter(),
        }
    }
}
